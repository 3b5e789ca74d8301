use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const SCENE: &str = r#"<scene>
  <shadow>
    <resolutions>128 512</resolutions>
    <pcf>on</pcf>
  </shadow>
  <object>
    <mesh>models/wall.obj</mesh>
  </object>
</scene>
"#;

const OBJ: &str = "mtllib wall.mtl
v -10 0 -10
v 10 0 -10
v 10 20 -10
v -10 20 -10
vt 0 0
vt 1 0
vt 1 1
vt 0 1
g wall
usemtl stone
f 1/1 2/2 3/3 4/4
";

const MTL: &str = "newmtl stone
Ka 0.1 0.1 0.1
Kd 0.6 0.6 0.6
map_Kd stone.png
";

fn write_scene(dir: &Path, scene: &str) -> std::path::PathBuf {
    let models = dir.join("models");
    fs::create_dir_all(&models).expect("models dir");
    fs::write(models.join("wall.obj"), OBJ).expect("write obj");
    fs::write(models.join("wall.mtl"), MTL).expect("write mtl");
    let path = dir.join("scene.xml");
    fs::write(&path, scene).expect("write scene");
    path
}

#[test]
fn summary_uses_built_in_scene() {
    let mut cmd = Command::cargo_bin("umbra").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Mesh: 1 groups, 1 materials, 12 triangles"))
        .stdout(contains("Depth targets: 4"))
        .stdout(contains(" - 4: 2048x2048"))
        .stdout(contains("Light-space target texcoord: (0.500, 0.500)"))
        .stdout(contains("Depth texture 1: 256x256, PCF: OFF | FPS: 0"))
        .stdout(contains(" - 1024x1024: "));
}

#[test]
fn summary_loads_scene_mesh_and_materials() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_scene(dir.path(), SCENE);

    let mut cmd = Command::cargo_bin("umbra").expect("binary exists");
    cmd.arg(&path).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Mesh: 1 groups, 1 materials, 2 triangles"))
        .stdout(contains(" - wall: 2 triangles, material stone"))
        .stdout(contains("Depth targets: 2"))
        .stdout(contains(" - 2: 512x512"))
        .stdout(contains("Depth texture 1: 128x128, PCF: ON"));
}

#[test]
fn invalid_scene_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_scene(
        dir.path(),
        "<scene><shadow><resolutions></resolutions></shadow></scene>",
    );

    let mut cmd = Command::cargo_bin("umbra").expect("binary exists");
    cmd.arg(&path).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("shadow resolutions"));
}

#[test]
fn unknown_flag_is_rejected() {
    let mut cmd = Command::cargo_bin("umbra").expect("binary exists");
    cmd.arg("--fullscreen");
    cmd.assert().failure().stderr(contains("Unknown argument"));
}
