//! Fog Settings Tests
//!
//! Tests for:
//! - JSON settings files (load / save / partial files)
//! - Shared settings edited outside the render loop
//! - Built-in shader library contents

use anyhow::Result;
use glam::Vec4;

use gradient_fog::renderer::shader_library::ShaderLibrary;
use gradient_fog::{FogError, FogParameters, FogSettings, ShaderHandle};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("gradient_fog_{}_{name}.json", std::process::id()))
}

#[test]
fn settings_file_roundtrip() -> Result<()> {
    let path = temp_path("roundtrip");
    let mut settings = FogSettings::default();
    settings.parameters_mut().end_distance = 120.0;
    settings.parameters_mut().near_color = Vec4::new(0.1, 0.1, 0.1, 0.5);

    settings.save(&path)?;
    let loaded = FogSettings::load(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(loaded, settings);
    Ok(())
}

#[test]
fn partial_file_takes_defaults() -> Result<()> {
    let settings = FogSettings::from_json_str(r#"{ "end_distance": 75.0 }"#)?;

    assert_eq!(settings.end_distance(), 75.0);
    assert_eq!(settings.start_distance(), FogParameters::default().start_distance);
    assert_eq!(settings.far_color(), FogParameters::default().far_color);
    assert_eq!(settings.shader(), &ShaderHandle::gradient_fog());
    Ok(())
}

#[test]
fn custom_shader_name_is_kept() -> Result<()> {
    let settings = FogSettings::from_json_str(r#"{ "shader": "passes/my_fog" }"#)?;
    assert_eq!(settings.shader().name(), "passes/my_fog");

    let json = settings.to_json_string()?;
    assert!(json.contains("\"passes/my_fog\""));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = FogSettings::load(temp_path("does_not_exist")).unwrap_err();
    assert!(matches!(err, FogError::IoError(_)));
}

#[test]
fn shared_settings_are_seen_by_every_holder() {
    let shared = FogSettings::default().into_shared();
    let editor = std::sync::Arc::clone(&shared);

    let handle = std::thread::spawn(move || {
        editor.write().parameters_mut().transparent_factor = 0.1;
    });
    handle.join().unwrap();

    assert_eq!(shared.read().transparent_factor(), 0.1);
}

#[test]
fn builtin_fog_program_is_embedded() {
    let library = ShaderLibrary::new();
    let source = library.get(ShaderHandle::GRADIENT_FOG).unwrap();

    assert!(source.wgsl.contains("fn fs_main"));
    assert!(source.wgsl.contains("fn vs_main"));
    for name in [
        "startDistance",
        "endDistance",
        "transparentFactor",
        "nearColor",
        "middleColor",
        "farColor",
    ] {
        assert!(source.layout.slot(name).is_some(), "missing slot {name}");
    }
}
