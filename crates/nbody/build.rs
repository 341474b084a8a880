use std::{
    fs,
    path::{Path, PathBuf},
};

fn main() {
    println!("cargo::rerun-if-changed=../../assets/");
    println!("cargo::rerun-if-changed=../../bin/");
    println!("cargo::rerun-if-changed=shaders/");
    println!("cargo::rerun-if-changed=config.toml");

    let out_dir = target_dir();

    copy_textures(&out_dir, "fatboy.png");
    copy_textures(&out_dir, "smiley.png");

    copy_shaders(&out_dir, "triangle.hlsl");
    copy_shaders(&out_dir, "particles.hlsl");
    copy_shaders(&out_dir, "nbody.hlsl");

    copy_file(&manifest_dir().join("config.toml"), &out_dir.join("config.toml"));

    // DXC ships with the Windows SDK too, so the workspace copies are optional
    copy_dll(&out_dir, "dxcompiler.dll");
    copy_dll(&out_dir, "dxil.dll");
}

/// The directory the executable is written to.
fn target_dir() -> PathBuf {
    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    Path::new(&out_dir).join("../../..")
}

fn manifest_dir() -> PathBuf {
    std::env::var("CARGO_MANIFEST_DIR")
        .expect("CARGO_MANIFEST_DIR is set by cargo")
        .into()
}

fn copy_textures(out_dir: &Path, texture: &str) {
    let dst_dir = out_dir.join("assets/textures");
    create_dir(&dst_dir);

    let src = manifest_dir().join("../../assets/textures").join(texture);
    copy_file(&src, &dst_dir.join(texture));
}

fn copy_shaders(out_dir: &Path, shader: &str) {
    let dst_dir = out_dir.join("shaders/nbody");
    create_dir(&dst_dir);

    let src = manifest_dir().join("shaders").join(shader);
    copy_file(&src, &dst_dir.join(shader));
}

fn copy_dll(out_dir: &Path, dll: &str) {
    let src = manifest_dir().join("../../bin").join(dll);
    if !src.exists() {
        println!("cargo::warning={dll} is not in bin/, the system copy will be loaded");
        return;
    }
    copy_file(&src, &out_dir.join(dll));
}

fn copy_file(src: &Path, dst: &Path) {
    println!("Copying {} to {}", src.display(), dst.display());

    if let Err(e) = fs::copy(src, dst) {
        panic!("Failed to copy {}: {e}", src.display());
    }
}

fn create_dir(dir: &Path) {
    if let Err(e) = fs::create_dir_all(dir) {
        println!("Failed to create {}: {e}", dir.display());
    }
}
