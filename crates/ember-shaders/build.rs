//! Build script to compile GLSL shaders to SPIR-V.

fn main() {
    println!("cargo:rerun-if-changed=../../assets/shaders/");

    #[cfg(feature = "compile")]
    compile::run();
}

#[cfg(feature = "compile")]
mod compile {
    use shaderc::{Compiler, ShaderKind};
    use std::env;
    use std::fs;
    use std::path::{Path, PathBuf};

    pub fn run() {
        let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
        let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
        let shader_dir = manifest_dir.join("../../assets/shaders");

        let compiler = Compiler::new().expect("Failed to create shader compiler");

        compile_shader(
            &compiler,
            shader_dir.join("shader.vert"),
            out_dir.join("vert.spv"),
            ShaderKind::Vertex,
        );
        compile_shader(
            &compiler,
            shader_dir.join("shader.frag"),
            out_dir.join("frag.spv"),
            ShaderKind::Fragment,
        );
    }

    fn compile_shader(
        compiler: &Compiler,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        kind: ShaderKind,
    ) {
        let input_path = input.as_ref();
        let output_path = output.as_ref();

        let source = fs::read_to_string(input_path)
            .unwrap_or_else(|e| panic!("Failed to read shader {}: {e}", input_path.display()));

        let file_name = input_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("shader");

        let mut options =
            shaderc::CompileOptions::new().expect("Failed to create compile options");
        options.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_3 as u32,
        );
        options.set_optimization_level(shaderc::OptimizationLevel::Performance);

        let artifact = compiler
            .compile_into_spirv(&source, kind, file_name, "main", Some(&options))
            .unwrap_or_else(|e| panic!("Failed to compile {file_name}: {e}"));

        if artifact.get_num_warnings() > 0 {
            println!("cargo:warning={}", artifact.get_warning_messages());
        }

        fs::write(output_path, artifact.as_binary_u8())
            .unwrap_or_else(|e| panic!("Failed to write {}: {e}", output_path.display()));
    }
}
