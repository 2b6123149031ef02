//! Input discovery and output directory tests.

use std::fs;

use gpsframes::{ExtractorError, paths};

#[test]
fn directory_yields_sorted_videos_only() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    for name in ["GH020042.MP4", "GH010042.MP4", "GH010042.THM", "notes.txt", "clip.mp4"] {
        fs::write(directory.path().join(name), b"").expect("Failed to write file");
    }
    fs::create_dir(directory.path().join("nested.mp4")).expect("Failed to create dir");

    let inputs = paths::collect_inputs(directory.path()).expect("videos found");
    let names: Vec<String> = inputs
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["GH010042.MP4", "GH020042.MP4", "clip.mp4"]);
}

#[test]
fn single_file_is_used_as_is() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let file = directory.path().join("recording.mov");
    fs::write(&file, b"").expect("Failed to write file");

    assert_eq!(paths::collect_inputs(&file).expect("file accepted"), vec![file]);
}

#[test]
fn missing_input_is_reported() {
    let result = paths::collect_inputs("this_directory_does_not_exist");
    assert!(matches!(result, Err(ExtractorError::InputMissing { .. })));
}

#[test]
fn directory_without_videos_is_invalid() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(directory.path().join("readme.txt"), b"").expect("Failed to write file");

    let result = paths::collect_inputs(directory.path());
    assert!(matches!(result, Err(ExtractorError::InvalidStructure(_))));
}

#[test]
fn output_directory_is_recreated_empty() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = directory.path().join("frames");
    fs::create_dir(&output).expect("Failed to create dir");
    fs::write(output.join("000000.jpg"), b"stale").expect("Failed to write file");

    paths::prepare_output_dir(&output).expect("output prepared");

    assert!(output.is_dir());
    assert_eq!(fs::read_dir(&output).expect("readable").count(), 0);
}

#[test]
fn output_directory_is_created_with_parents() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = directory.path().join("a").join("b");
    paths::prepare_output_dir(&output).expect("output prepared");
    assert!(output.is_dir());
}

#[test]
fn output_under_a_file_cannot_be_created() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let blocker = directory.path().join("blocker");
    fs::write(&blocker, b"").expect("Failed to write file");

    let result = paths::prepare_output_dir(blocker.join("frames"));
    assert!(matches!(
        result,
        Err(ExtractorError::CannotCreateOutput { .. })
    ));
}
