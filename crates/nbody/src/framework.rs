use std::ffi::CString;
use std::time::Duration;

use windows::core::PCSTR;
use windows::Win32::{
    Foundation::{HWND, LPARAM, LRESULT, RECT, WPARAM},
    System::LibraryLoader::GetModuleHandleA,
    UI::Input::KeyboardAndMouse::*,
    UI::WindowsAndMessaging::*,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gfx::{renderer::Renderer, timer::StepTimer};

/// Opens the window and renders until it is closed or a frame fails.
pub fn run(config: &Config) -> Result<()> {
    let name = windows::core::s!("nbody");
    let title = CString::new(config.window.title.as_str()).map_err(|e| Error::InvalidConfig {
        field: "window.title",
        reason: e.to_string(),
    })?;

    let instance = unsafe { GetModuleHandleA(None)? };

    let wnd_class = WNDCLASSEXA {
        cbSize: std::mem::size_of::<WNDCLASSEXA>() as u32,
        // redraw when the size changes horizontally or vertically
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(wnd_proc),
        hInstance: instance.into(),
        hCursor: unsafe { LoadCursorW(None, IDC_ARROW)? },
        lpszClassName: name,
        ..Default::default()
    };
    if unsafe { RegisterClassExA(&wnd_class) } == 0 {
        return Err(windows::core::Error::from_win32().into());
    }

    let mut rect = RECT {
        left: 0,
        top: 0,
        right: config.client_width() as i32,
        bottom: config.client_height() as i32,
    };

    let mut framework: Option<Framework> = None;

    let hwnd = unsafe {
        AdjustWindowRect(&mut rect, WS_OVERLAPPEDWINDOW, false)?;

        CreateWindowExA(
            WINDOW_EX_STYLE::default(),
            name,
            PCSTR(title.as_ptr() as *const u8),
            WS_OVERLAPPEDWINDOW,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            rect.right - rect.left,
            rect.bottom - rect.top,
            None,
            None,
            instance,
            Some(&mut framework as *mut Option<Framework> as *mut std::ffi::c_void),
        )?
    };

    framework = Some(Framework::new(hwnd, config)?);

    unsafe {
        let _ = ShowWindow(hwnd, SW_SHOW);
    }

    let mut msg = MSG::default();
    while msg.message != WM_QUIT {
        if unsafe { PeekMessageA(&mut msg, None, 0, 0, PM_REMOVE) }.into() {
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageA(&msg);
            }
        }
    }

    let Some(mut framework) = framework.take() else {
        return Ok(());
    };
    let shut_down = framework.renderer.shut_down();
    match framework.error.take() {
        Some(e) => Err(e),
        None => shut_down,
    }
}

extern "system" fn wnd_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_CREATE => {
            unsafe {
                let data: &CREATESTRUCTA = std::mem::transmute(lparam);
                SetWindowLongPtrA(hwnd, GWLP_USERDATA, data.lpCreateParams as _);
            }
            LRESULT::default()
        }
        WM_PAINT => {
            if let Some(framework) = get_framework(hwnd) {
                framework.tick();
            }
            LRESULT::default()
        }
        WM_KEYUP => {
            if let Some(framework) = get_framework(hwnd) {
                if wparam.0 == VK_SPACE.0.into() {
                    framework.toggle_pause();
                } else if wparam.0 == VK_ESCAPE.0.into() {
                    unsafe {
                        let _ = DestroyWindow(hwnd);
                    }
                }
            }
            LRESULT::default()
        }
        WM_DESTROY => {
            unsafe {
                PostQuitMessage(0);
            }
            LRESULT::default()
        }
        _ => unsafe { DefWindowProcA(hwnd, msg, wparam, lparam) },
    }
}

fn get_framework<'a>(hwnd: HWND) -> Option<&'a mut Framework> {
    let user_data = unsafe { GetWindowLongPtrA(hwnd, GWLP_USERDATA) };
    let framework = user_data as *mut Option<Framework>;
    // null until WM_CREATE, `None` until the renderer exists
    unsafe { framework.as_mut() }.and_then(Option::as_mut)
}

struct Framework {
    renderer: Renderer,
    timer: StepTimer,
    paused: bool,
    // the first failure ends the message loop and is returned from `run`
    error: Option<Error>,
}

impl Framework {
    fn new(hwnd: HWND, config: &Config) -> Result<Self> {
        let renderer = Renderer::initialize(hwnd, config)?;

        let simulation = &config.simulation;
        let fixed_step = simulation
            .fixed_step
            .then(|| Duration::from_secs_f32(simulation.time_step));

        Ok(Self {
            renderer,
            timer: StepTimer::new(fixed_step),
            paused: simulation.paused,
            error: None,
        })
    }

    fn tick(&mut self) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.frame() {
            tracing::error!("Frame {} failed: {e}", self.timer.frame_count());
            self.error = Some(e);
            unsafe { PostQuitMessage(1) };
        }
    }

    fn frame(&mut self) -> Result<()> {
        let steps = self.timer.tick();

        self.renderer.update(&self.timer)?;
        if !self.paused {
            // one fixed step, or the measured frame time in variable mode
            let delta_time = self.timer.elapsed_seconds() as f32;
            self.renderer.simulate(steps, delta_time)?;
        }
        self.renderer.render()
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        tracing::info!(
            paused = self.paused,
            fps = self.timer.frames_per_second(),
            "Toggled the simulation"
        );
    }
}
