//! N-body particle simulation.
//!
//! Particles live in two structured buffers. Every step a compute dispatch reads all
//! particles from one buffer (`t0`) and writes the integrated result into the other
//! (`u0`), then the roles swap. The graphics pass pulls the latest buffer as point
//! sprites through a root SRV, so no vertex buffer is involved.
//!
//! Both buffers stay in `COMMON` between submissions and rely on implicit promotion;
//! every submission is waited on before the next queue touches them.

#[cfg(windows)]
use windows::Win32::Graphics::{Direct3D::D3D_PRIMITIVE_TOPOLOGY_POINTLIST, Direct3D12::*};

#[cfg(windows)]
use super::d3d12::{
    buffer::{self, ConstantBuffer},
    command::Queue,
    resource,
    root_signature::{RootParameter, RootSignature, RootSignatureBuilder},
    shader::{self, ShaderId, Shaders},
};
use super::math::{divide_and_round_up, Mat4, Vec3};
use crate::config::SimulationConfig;
#[cfg(windows)]
use crate::error::Result;

/// Must match `numthreads` in `nbody.hlsl`.
pub const THREAD_GROUP_SIZE: u32 = 256;

const GOLDEN_ANGLE: f32 = 2.399_963;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
    /// `w` holds the mass.
    pub position: [f32; 4],
    pub velocity: [f32; 4],
}

impl Particle {
    pub fn mass(&self) -> f32 {
        self.position[3]
    }
}

/// Root constants of the compute pass, `b0`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimulationConstants {
    pub delta_time: f32,
    pub gravity: f32,
    pub softening_squared: f32,
    pub damping: f32,
    pub particle_count: u32,
    pub _pad: [u32; 3],
}

impl SimulationConstants {
    pub const COUNT: u32 = (std::mem::size_of::<Self>() / std::mem::size_of::<u32>()) as u32;

    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            delta_time: config.time_step,
            gravity: config.gravity,
            softening_squared: config.softening * config.softening,
            damping: config.damping,
            particle_count: config.particle_count,
            _pad: [0; 3],
        }
    }

    /// Same constants integrating `delta_time` seconds per dispatch.
    pub fn with_delta_time(self, delta_time: f32) -> Self {
        Self { delta_time, ..self }
    }
}

/// Constant buffer of the particle draw, `b0`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleDrawConstants {
    pub view_projection: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl ParticleDrawConstants {
    pub fn new(view_projection: Mat4) -> Self {
        Self {
            view_projection: view_projection.to_cols_array_2d(),
            color: [1.0, 0.8, 0.4, 0.35],
        }
    }
}

pub fn dispatch_groups(particle_count: u32) -> u32 {
    divide_and_round_up(particle_count, THREAD_GROUP_SIZE)
}

/// A flat, rotating disc of unit-mass particles laid out on a golden-angle spiral in
/// the XZ plane.
///
/// Each particle starts on the circular orbit of the mass enclosed by its radius; the
/// mean velocity is then removed so the disc does not drift.
pub fn initial_particles(count: u32, radius: f32, gravity: f32) -> Vec<Particle> {
    let mut particles: Vec<Particle> = (0..count)
        .map(|i| {
            let fraction = (i as f32 + 0.5) / count as f32;
            let r = radius * fraction.sqrt();
            let theta = i as f32 * GOLDEN_ANGLE;
            let (sin, cos) = theta.sin_cos();

            // a uniform disc encloses mass proportional to the covered area
            let enclosed_mass = count as f32 * fraction;
            let speed = (gravity * enclosed_mass / r).sqrt();

            let position = Vec3::new(r * cos, 0.0, r * sin);
            let velocity = Vec3::new(-sin, 0.0, cos) * speed;

            Particle {
                position: position.extend(1.0).to_array(),
                velocity: velocity.extend(0.0).to_array(),
            }
        })
        .collect();

    if !particles.is_empty() {
        let total_mass: f32 = particles.iter().map(Particle::mass).sum();
        let momentum = particles.iter().fold(Vec3::ZERO, |sum, p| {
            sum + Vec3::from_slice(&p.velocity[..3]) * p.mass()
        });
        let drift = momentum / total_mass;

        for p in &mut particles {
            let velocity = Vec3::from_slice(&p.velocity[..3]) - drift;
            p.velocity = velocity.extend(0.0).to_array();
        }
    }

    particles
}

// compute root parameters
#[cfg(windows)]
const CONSTANTS_PARAMETER: u32 = 0;
#[cfg(windows)]
const INPUT_PARAMETER: u32 = 1;
#[cfg(windows)]
const OUTPUT_PARAMETER: u32 = 2;

// draw root parameters
#[cfg(windows)]
const DRAW_CONSTANTS_PARAMETER: u32 = 0;
#[cfg(windows)]
const PARTICLES_PARAMETER: u32 = 1;

#[cfg(windows)]
pub struct NBody {
    queue: Queue,
    compute_root_signature: RootSignature,
    draw_root_signature: RootSignature,

    buffers: [ID3D12Resource; 2],
    upload_heap: Option<ID3D12Resource>,
    // the buffer holding the latest state
    read_index: usize,

    constants: SimulationConstants,
    draw_constants: ConstantBuffer,
}

#[cfg(windows)]
impl NBody {
    /// Records the upload of the initial particles on `command_list`.
    pub fn build(
        device: &ID3D12Device2,
        command_list: &ID3D12GraphicsCommandList,
        config: &SimulationConfig,
    ) -> Result<Self> {
        let queue = Queue::build(device, D3D12_COMMAND_LIST_TYPE_COMPUTE, "compute_queue")?;
        // reopened by every step
        queue.close()?;

        let compute_root_signature = RootSignatureBuilder::new()
            .parameter(
                RootParameter::Constants {
                    register: 0,
                    count: SimulationConstants::COUNT,
                },
                D3D12_SHADER_VISIBILITY_ALL,
            )
            .parameter(
                RootParameter::ShaderResourceView { register: 0 },
                D3D12_SHADER_VISIBILITY_ALL,
            )
            .parameter(
                RootParameter::UnorderedAccessView { register: 0 },
                D3D12_SHADER_VISIBILITY_ALL,
            )
            .build(device, "nbody::compute_root_signature")?;

        let draw_root_signature = RootSignatureBuilder::new()
            .parameter(
                RootParameter::ConstantBufferView { register: 0 },
                D3D12_SHADER_VISIBILITY_ALL,
            )
            .parameter(
                RootParameter::ShaderResourceView { register: 0 },
                D3D12_SHADER_VISIBILITY_VERTEX,
            )
            .flags(
                D3D12_ROOT_SIGNATURE_FLAG_DENY_HULL_SHADER_ROOT_ACCESS
                    | D3D12_ROOT_SIGNATURE_FLAG_DENY_DOMAIN_SHADER_ROOT_ACCESS
                    | D3D12_ROOT_SIGNATURE_FLAG_DENY_GEOMETRY_SHADER_ROOT_ACCESS,
            )
            .build(device, "nbody::draw_root_signature")?;

        let particles = initial_particles(config.particle_count, config.disc_radius, config.gravity);
        let data: &[u8] = bytemuck::cast_slice(&particles);

        let upload_heap = resource::create_upload_buffer(device, data, "nbody::upload_heap")?;
        let create_particle_buffer = |name: &str| {
            resource::create_buffer(
                device,
                data.len() as u64,
                D3D12_HEAP_TYPE_DEFAULT,
                D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS,
                D3D12_RESOURCE_STATE_COMMON,
                name,
            )
        };
        let buffers = [
            create_particle_buffer("nbody::particles[0]")?,
            create_particle_buffer("nbody::particles[1]")?,
        ];

        for buffer in &buffers {
            unsafe { command_list.CopyBufferRegion(buffer, 0, &upload_heap, 0, data.len() as u64) };
        }

        let draw_constants = buffer::create_constant_buffer_for_root(
            device,
            std::mem::size_of::<ParticleDrawConstants>(),
            "nbody::draw_constants",
        )?;

        tracing::info!(
            particles = config.particle_count,
            groups = dispatch_groups(config.particle_count),
            "Created N-body simulation"
        );

        Ok(Self {
            queue,
            compute_root_signature,
            draw_root_signature,
            buffers,
            upload_heap: Some(upload_heap),
            read_index: 0,
            constants: SimulationConstants::new(config),
            draw_constants,
        })
    }

    pub fn compute_root_signature(&self) -> &RootSignature {
        &self.compute_root_signature
    }

    pub fn draw_root_signature(&self) -> &RootSignature {
        &self.draw_root_signature
    }

    pub fn particle_count(&self) -> u32 {
        self.constants.particle_count
    }

    /// Only valid once the command list that recorded the upload has executed.
    pub fn release_upload_heap(&mut self) {
        self.upload_heap = None;
    }

    /// Runs `steps` integration steps of `delta_time` seconds each on the compute queue,
    /// waiting for each.
    pub fn simulate(&mut self, shaders: &Shaders, steps: u32, delta_time: f32) -> Result<()> {
        self.constants = self.constants.with_delta_time(delta_time);
        for _ in 0..steps {
            self.step(shaders)?;
        }
        Ok(())
    }

    fn step(&mut self, shaders: &Shaders) -> Result<()> {
        self.queue.reset(Some(shaders.pipeline_state(ShaderId::NBody)?))?;

        let command_list = self.queue.command_list();
        let input = &self.buffers[self.read_index];
        let output = &self.buffers[1 - self.read_index];

        self.compute_root_signature.set_compute(command_list);
        unsafe {
            command_list.SetComputeRoot32BitConstants(
                CONSTANTS_PARAMETER,
                SimulationConstants::COUNT,
                &self.constants as *const _ as _,
                0,
            );
            command_list.SetComputeRootShaderResourceView(INPUT_PARAMETER, input.GetGPUVirtualAddress());
            command_list.SetComputeRootUnorderedAccessView(OUTPUT_PARAMETER, output.GetGPUVirtualAddress());
        }
        shader::set_compute_dispatch(command_list, dispatch_groups(self.particle_count()), 1, 1);

        self.queue.execute()?;
        self.queue.wait_for_previous_frame()?;

        self.read_index = 1 - self.read_index;
        Ok(())
    }

    pub fn update(&mut self, view_projection: Mat4, frame_index: usize) -> Result<()> {
        self.draw_constants
            .set_constant_buffer_data(&ParticleDrawConstants::new(view_projection), frame_index)
    }

    pub fn draw(
        &self,
        command_list: &ID3D12GraphicsCommandList,
        shaders: &Shaders,
        frame_index: usize,
    ) -> Result<()> {
        shaders.set_pipeline_state(command_list, ShaderId::Particles)?;
        self.draw_root_signature.set_graphics(command_list);
        self.draw_constants
            .bind_constant_buffer_for_root(command_list, DRAW_CONSTANTS_PARAMETER, frame_index)?;

        let particles = &self.buffers[self.read_index];
        unsafe {
            command_list.SetGraphicsRootShaderResourceView(PARTICLES_PARAMETER, particles.GetGPUVirtualAddress());
        }
        shader::set_topology(command_list, D3D_PRIMITIVE_TOPOLOGY_POINTLIST);
        unsafe { command_list.DrawInstanced(self.particle_count(), 1, 0, 0) };
        Ok(())
    }

    /// Blocks until the last compute submission has finished.
    pub fn wait_idle(&mut self) -> Result<()> {
        self.queue.wait_for_previous_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_fit_eight_root_values() {
        assert_eq!(SimulationConstants::COUNT, 8);
        assert_eq!(std::mem::size_of::<Particle>(), 32);
    }

    #[test]
    fn constants_follow_config() {
        let config = SimulationConfig {
            softening: 0.5,
            particle_count: 512,
            ..Default::default()
        };
        let constants = SimulationConstants::new(&config);
        assert_eq!(constants.softening_squared, 0.25);
        assert_eq!(constants.particle_count, 512);
        assert_eq!(constants.delta_time, config.time_step);
    }

    #[test]
    fn simulated_time_follows_the_frame_time() {
        use crate::gfx::timer::StepTimer;
        use std::time::{Duration, Instant};

        let config = SimulationConfig {
            fixed_step: false,
            ..Default::default()
        };
        let start = Instant::now();
        let mut timer = StepTimer::starting_at(start, None);
        let steps = timer.tick_at(start + Duration::from_millis(100));

        let constants =
            SimulationConstants::new(&config).with_delta_time(timer.elapsed_seconds() as f32);
        let simulated = constants.delta_time * steps as f32;
        assert!((simulated - 0.1).abs() < 1e-6, "simulated {simulated}s");
        assert_eq!(constants.gravity, config.gravity);
    }

    #[test]
    fn fixed_steps_sum_to_the_frame_time() {
        use crate::gfx::timer::StepTimer;
        use std::time::{Duration, Instant};

        let step = Duration::from_millis(10);
        let start = Instant::now();
        let mut timer = StepTimer::starting_at(start, Some(step));
        let steps = timer.tick_at(start + Duration::from_millis(30));

        let delta_time = timer.elapsed_seconds() as f32;
        assert_eq!(steps, 3);
        assert!((delta_time * steps as f32 - 0.03).abs() < 1e-6);
    }

    #[test]
    fn dispatch_covers_every_particle() {
        assert_eq!(dispatch_groups(256), 1);
        assert_eq!(dispatch_groups(257), 2);
        assert_eq!(dispatch_groups(4096), 16);
        assert_eq!(dispatch_groups(0), 0);
    }

    #[test]
    fn initial_state_is_deterministic() {
        let a = initial_particles(512, 4.0, 0.0002);
        let b = initial_particles(512, 4.0, 0.0002);
        assert_eq!(a, b);
        assert_eq!(a.len(), 512);
    }

    #[test]
    fn particles_stay_inside_the_disc() {
        for p in initial_particles(1024, 4.0, 0.0002) {
            let r = Vec3::from_slice(&p.position[..3]).length();
            assert!(r <= 4.0 + 1e-4);
            assert_eq!(p.position[1], 0.0);
            assert_eq!(p.mass(), 1.0);
        }
    }

    #[test]
    fn total_momentum_is_zero() {
        let particles = initial_particles(1000, 4.0, 0.0002);
        let momentum = particles.iter().fold(Vec3::ZERO, |sum, p| {
            sum + Vec3::from_slice(&p.velocity[..3]) * p.mass()
        });
        assert!(momentum.length() < 1e-3, "momentum {momentum}");
    }

    #[test]
    fn disc_rotates_one_way() {
        for p in initial_particles(256, 4.0, 0.0002) {
            let r = Vec3::from_slice(&p.position[..3]);
            let v = Vec3::from_slice(&p.velocity[..3]);
            assert!(r.cross(v).y < 0.0);
        }
    }

    #[test]
    fn no_particles_is_empty() {
        assert!(initial_particles(0, 4.0, 0.0002).is_empty());
    }
}
