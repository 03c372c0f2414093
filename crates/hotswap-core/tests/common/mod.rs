//! Test fixtures: real module builds deployed at the resolved path

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hotswap_core::{Dispatcher, LoaderOptions, ModuleLoader, ReloadCoordinator, ResolvedPath};
use tempfile::TempDir;

const ELEMENT_DECL: &str = r#"
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Vec3 { pub x: f32, pub y: f32, pub z: f32 }
"#;

/// A module whose `transform` multiplies each axis by a constant and the weight
pub fn scaling_source(kx: f32, ky: f32, kz: f32) -> String {
    format!(
        r#"{ELEMENT_DECL}
#[no_mangle]
pub extern "C" fn transform(v: Vec3, w: f32) -> Vec3 {{
    Vec3 {{ x: v.x * {kx:?} * w, y: v.y * {ky:?} * w, z: v.z * {kz:?} * w }}
}}
"#
    )
}

/// A module that builds fine but exports the wrong symbol
pub fn missing_symbol_source() -> String {
    format!(
        r#"{ELEMENT_DECL}
#[no_mangle]
pub extern "C" fn transform_v2(v: Vec3, _w: f32) -> Vec3 {{
    v
}}
"#
    )
}

/// Scratch workspace with a base directory, a build directory and a shadow
/// directory, plus a clock for distinct modification times
pub struct Workspace {
    root: TempDir,
    deploys: u64,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        for sub in ["plugins", "build", "shadow"] {
            std::fs::create_dir_all(root.path().join(sub)).unwrap();
        }
        Self { root, deploys: 0 }
    }

    pub fn base_dir(&self) -> PathBuf {
        self.root.path().join("plugins")
    }

    pub fn shadow_dir(&self) -> PathBuf {
        self.root.path().join("shadow")
    }

    pub fn resolved(&self) -> ResolvedPath {
        hotswap_core::resolve(self.base_dir()).unwrap()
    }

    pub fn loader(&self) -> ModuleLoader {
        ModuleLoader::with_options(LoaderOptions::new().with_shadow_dir(self.shadow_dir()))
    }

    pub fn coordinator(&self) -> Arc<ReloadCoordinator> {
        Arc::new(ReloadCoordinator::new(self.resolved(), self.loader()))
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.coordinator())
    }

    /// Compile `source` into a dynamic library under the build directory
    pub fn build(&self, name: &str, source: &str) -> PathBuf {
        let build_dir = self.root.path().join("build");
        let src = build_dir.join(format!("{name}.rs"));
        let out = build_dir.join(format!("{name}.{}", std::env::consts::DLL_EXTENSION));
        std::fs::write(&src, source).unwrap();

        let rustc = std::env::var_os("RUSTC").unwrap_or_else(|| "rustc".into());
        let status = Command::new(rustc)
            .args(["--crate-type", "cdylib", "--edition", "2021", "-C", "opt-level=0"])
            .arg("--crate-name")
            .arg(name)
            .arg("-o")
            .arg(&out)
            .arg(&src)
            .status()
            .expect("failed to run rustc");
        assert!(status.success(), "building fixture module {name} failed");
        out
    }

    /// Place a built module at the resolved path with a fresh, distinct mtime
    pub fn deploy(&mut self, built: &Path) -> SystemTime {
        self.deploys += 1;
        let target = self.resolved().into_path_buf();
        let staging = target.with_extension("staging");
        std::fs::copy(built, &staging).unwrap();
        std::fs::rename(&staging, &target).unwrap();

        // Whole seconds, so every filesystem stores the value exactly.
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let mtime = UNIX_EPOCH + Duration::from_secs(now - 3600 + self.deploys * 10);
        std::fs::File::options()
            .write(true)
            .open(&target)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        mtime
    }

    /// Delete the module at the resolved path
    pub fn remove(&self) {
        std::fs::remove_file(self.resolved().as_path()).unwrap();
    }

    /// Number of shadow copies currently on disk
    pub fn shadow_copies(&self) -> usize {
        std::fs::read_dir(self.shadow_dir()).unwrap().count()
    }
}
