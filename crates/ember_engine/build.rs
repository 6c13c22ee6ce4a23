// build.rs
// Compiles the GLSL shaders under resources/shaders into target/shaders/<name>.<stage>.spv

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_STAGES: [&str; 3] = ["vert", "frag", "comp"];

/// Whether `source` is newer than `output` or `output` is missing
fn needs_compile(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(dst)) => src > dst,
        _ => true,
    }
}

/// Compile every shader stage file in `shader_dir`; returns how many were rebuilt
fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &Path) -> Result<u32, String> {
    let entries = std::fs::read_dir(shader_dir)
        .map_err(|e| format!("cannot read {}: {}", shader_dir.display(), e))?;

    let mut compiled = 0;
    for entry in entries {
        let path = entry.map_err(|e| e.to_string())?.path();
        let is_stage = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_STAGES.contains(&ext));
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !is_stage {
            continue;
        }

        // pbr.vert -> pbr.vert.spv, so stages of one shader never collide
        let output = target_dir.join(format!("{file_name}.spv"));
        if !needs_compile(&path, &output) {
            continue;
        }

        let status = Command::new(glslc)
            .arg("--target-env=vulkan1.3")
            .arg("-I")
            .arg(shader_dir)
            .arg(&path)
            .arg("-o")
            .arg(&output)
            .status()
            .map_err(|e| format!("failed to run glslc: {e}"))?;
        if !status.success() {
            return Err(format!(
                "glslc failed for {} with exit code {}",
                path.display(),
                status.code().unwrap_or(-1)
            ));
        }
        eprintln!("info: Compiled {file_name} -> {}", output.display());
        compiled += 1;
    }
    Ok(compiled)
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    let workspace_root = manifest_dir.join("../..");
    let shader_dir = workspace_root.join("resources/shaders");
    let target_dir = workspace_root.join("target/shaders");

    println!("cargo:rerun-if-changed={}", shader_dir.display());
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        println!("cargo:warning=VULKAN_SDK not set, shader compilation skipped");
        return;
    };
    let glslc = if cfg!(target_os = "windows") {
        PathBuf::from(&vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        PathBuf::from(&vulkan_sdk).join("bin").join("glslc")
    };
    if !glslc.exists() {
        println!("cargo:warning=glslc not found at {}, shader compilation skipped", glslc.display());
        return;
    }

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {}: {}", target_dir.display(), e);
        return;
    }

    match compile_shaders(&shader_dir, &target_dir, &glslc) {
        Ok(0) => eprintln!("info: All shaders are up to date"),
        Ok(count) => eprintln!("info: Compiled {count} shader(s)"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
