use std::fs;
use std::path::{Path, PathBuf};
use serde::Deserialize;

#[path = "src/sys/headers.rs"]
mod headers;

#[derive(Deserialize)]
struct Config {
    application: Application,
    codec: Codec,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Codec {
    mode: String,
    channels: u8,
    quality: i32,
    complexity: i32,
    vbr: bool,
    vad: bool,
    dtx: bool,
    enhancement: bool,
    frames_per_packet: u32,
}

// 在编译时读取 config.toml 并设置环境变量
fn export_config() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    // 应用信息
    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 编解码默认参数
    println!("cargo:rustc-env=CODEC_MODE={}", config.codec.mode);
    println!("cargo:rustc-env=CODEC_CHANNELS={}", config.codec.channels);
    println!("cargo:rustc-env=CODEC_QUALITY={}", config.codec.quality);
    println!("cargo:rustc-env=CODEC_COMPLEXITY={}", config.codec.complexity);
    println!("cargo:rustc-env=CODEC_VBR={}", config.codec.vbr);
    println!("cargo:rustc-env=CODEC_VAD={}", config.codec.vad);
    println!("cargo:rustc-env=CODEC_DTX={}", config.codec.dtx);
    println!("cargo:rustc-env=CODEC_ENHANCEMENT={}", config.codec.enhancement);
    println!(
        "cargo:rustc-env=CODEC_FRAMES_PER_PACKET={}",
        config.codec.frames_per_packet
    );
}

/// Locate libspeex. Returns the include directories to search for the
/// headers listed in wrapper.h.
fn probe_native_library() -> Vec<PathBuf> {
    let target = std::env::var("TARGET").unwrap_or_default();

    if target.contains("musl") {
        // musl 目标：使用手动编译的静态库，不依赖 pkg-config
        println!("cargo:rerun-if-env-changed=SPEEX_SYSROOT");
        let mut include_paths = Vec::new();
        if let Ok(sysroot) = std::env::var("SPEEX_SYSROOT") {
            println!("cargo:rustc-link-search=native={}/usr/lib", sysroot);
            include_paths.push(PathBuf::from(format!("{}/usr/include", sysroot)));
        }
        println!("cargo:rustc-link-lib=static=speex");
        return include_paths;
    }

    // 其他目标：通过 pkg-config 查找 libspeex
    let library = pkg_config::Config::new()
        .probe("speex")
        .expect("Failed to find speex. Please install libspeex-dev.");

    for path in &library.include_paths {
        println!("cargo:include={}", path.display());
    }
    library.include_paths
}

/// Every header aggregated by wrapper.h must appear exactly once, in order,
/// and should resolve on the include path.
fn check_aggregated_headers(include_paths: &[PathBuf]) {
    println!("cargo:rerun-if-changed=wrapper.h");
    println!("cargo:rerun-if-changed=src/sys/headers.rs");

    let wrapper = fs::read_to_string("wrapper.h").expect("Failed to read wrapper.h");
    let included = match headers::check_wrapper(&wrapper) {
        Ok(included) => included,
        Err(e) => panic!("{}", e),
    };

    let mut search: Vec<PathBuf> = include_paths.to_vec();
    search.push(PathBuf::from("/usr/include"));
    search.push(PathBuf::from("/usr/local/include"));

    for header in included {
        // pkg-config may already point inside the speex/ directory
        let file_name = Path::new(&header)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default();
        let found = search
            .iter()
            .any(|dir| dir.join(&header).is_file() || dir.join(&file_name).is_file());
        if !found {
            println!("cargo:warning=header {} from wrapper.h was not found", header);
        }
    }
}

fn main() {
    export_config();
    let include_paths = probe_native_library();
    check_aggregated_headers(&include_paths);
}
