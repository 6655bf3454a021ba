use std::path::PathBuf;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_scenereel")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "scenereel.exe"
            } else {
                "scenereel"
            });
            p
        })
}

fn fixture() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data/two_scenes.json")
        .to_string_lossy()
        .to_string()
}

#[test]
fn cli_info_prints_timeline() {
    let output = std::process::Command::new(exe())
        .args(["info", "--in", fixture().as_str()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 scene(s), total 3000 ms"), "{stdout}");
}

#[test]
fn cli_frame_writes_png() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("scene2.png");
    let _ = std::fs::remove_file(&out_path);

    let status = std::process::Command::new(exe())
        .args([
            "frame",
            "--in",
            fixture().as_str(),
            "--at-ms",
            "1500",
            "--width",
            "160",
            "--height",
            "90",
            "--out",
        ])
        .arg(&out_path)
        .status()
        .unwrap();

    assert!(status.success());
    let bytes = std::fs::read(&out_path).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn cli_rejects_missing_document() {
    let output = std::process::Command::new(exe())
        .args(["info", "--in", "does/not/exist.json"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("load error"), "{stderr}");
}

#[test]
fn cli_export_writes_mp4() {
    if !scenereel::is_ffmpeg_on_path() {
        return;
    }
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("two_scenes.mp4");
    let _ = std::fs::remove_file(&out_path);

    let status = std::process::Command::new(exe())
        .args([
            "export",
            "--in",
            fixture().as_str(),
            "--width",
            "64",
            "--height",
            "64",
            "--fps",
            "10",
            "--out",
        ])
        .arg(&out_path)
        .status()
        .unwrap();

    assert!(status.success());
    let bytes = std::fs::read(&out_path).unwrap();
    assert_eq!(&bytes[4..8], b"ftyp");
}
