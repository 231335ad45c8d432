use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Embed the Windows manifest that requests administrator privileges.
    // SendInput cannot reach an elevated game from a non-elevated process.
    let _ = embed_resource::compile("verify-responder.rc", embed_resource::NONE);
    println!("cargo:rerun-if-changed=verify-responder.rc");
    println!("cargo:rerun-if-changed=verify-responder.manifest");

    copy_config();
}

/// Copies config.json next to the built executable so the lookup in
/// `config::load_config` finds it when running from `target/`.
fn copy_config() {
    let Ok(out_dir) = env::var("OUT_DIR") else {
        return;
    };
    // OUT_DIR is target/<profile>/build/verify-responder-<hash>/out
    let Some(target_dir) = Path::new(&out_dir).ancestors().nth(3) else {
        return;
    };

    let config_src = Path::new("config.json");
    if config_src.exists() {
        let _ = fs::copy(config_src, target_dir.join("config.json"));
        println!("cargo:rerun-if-changed=config.json");
    }
}
