use std::path::Path;
use std::process::{Command, Output};

fn git(repo: &Path, args: &[&str]) {
    git_with_env(repo, &[], args);
}

fn git_with_env(repo: &Path, env: &[(&str, &str)], args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .envs(env.iter().copied())
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("TZ", "UTC")
        .env("HOME", repo)
        .env("GIT_AUTHOR_NAME", "Dev")
        .env("GIT_AUTHOR_EMAIL", "dev@example.com")
        .env("GIT_COMMITTER_NAME", "Dev")
        .env("GIT_COMMITTER_EMAIL", "dev@example.com")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// `main` has engine/a.txt; `feature` adds two lines to it and a file in docs/.
fn diverged_repo(root: &Path) -> std::path::PathBuf {
    let repo = root.join("repo");
    std::fs::create_dir_all(repo.join("engine")).unwrap();
    std::fs::create_dir_all(repo.join("docs")).unwrap();

    git(&repo, &["init", "-q"]);
    git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(repo.join("engine/a.txt"), "one\ntwo\nthree\n").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "initial"]);

    git(&repo, &["checkout", "-q", "-b", "feature"]);
    std::fs::write(repo.join("engine/a.txt"), "one\ntwo\nthree\nfour\nfive\n").unwrap();
    std::fs::write(repo.join("docs/notes.md"), "hello\n").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "grow engine"]);
    git(&repo, &["checkout", "-q", "main"]);
    repo
}

/// Commit everything in `repo` with author and committer date `when`.
fn commit_at(repo: &Path, when: &str, message: &str) {
    git(repo, &["add", "."]);
    git_with_env(
        repo,
        &[("GIT_AUTHOR_DATE", when), ("GIT_COMMITTER_DATE", when)],
        &["commit", "-q", "-m", message],
    );
}

/// `main`: c0 on 01-01 and m1 (docs only) on 01-07. `feature` forks at c0
/// and grows engine/a.txt by two lines on 01-10.
fn dated_repo(root: &Path) -> std::path::PathBuf {
    let repo = root.join("repo");
    std::fs::create_dir_all(repo.join("engine")).unwrap();
    std::fs::create_dir_all(repo.join("docs")).unwrap();

    git(&repo, &["init", "-q"]);
    git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(repo.join("engine/a.txt"), "one\n").unwrap();
    commit_at(&repo, "2024-01-01 12:00:00 +0000", "c0");

    git(&repo, &["branch", "feature"]);
    std::fs::write(repo.join("docs/m.md"), "x\n").unwrap();
    commit_at(&repo, "2024-01-07 12:00:00 +0000", "m1");

    git(&repo, &["checkout", "-q", "feature"]);
    std::fs::write(repo.join("engine/a.txt"), "one\ntwo\nthree\n").unwrap();
    commit_at(&repo, "2024-01-10 12:00:00 +0000", "f1");
    git(&repo, &["checkout", "-q", "main"]);
    repo
}

fn json_stdout(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn write_config(root: &Path) -> std::path::PathBuf {
    let path = root.join("drift.toml");
    std::fs::write(
        &path,
        r#"
[repository]
use_remote_branches = false

[tracking]
base_branch = "main"
branches = ["feature"]
directories = ["engine", "docs"]

[cache]
dir = "../cache"
"#,
    )
    .unwrap();
    path
}

fn branchdrift(root: &Path, repo: &Path, config: &Path, args: &[&str]) -> Output {
    branchdrift_in_zone("UTC", root, repo, config, args)
}

fn branchdrift_in_zone(
    tz: &str,
    root: &Path,
    repo: &Path,
    config: &Path,
    args: &[&str],
) -> Output {
    Command::new(env!("CARGO_BIN_EXE_branchdrift"))
        .arg("--repo")
        .arg(repo)
        .arg("--config")
        .arg(config)
        .args(["--color", "never"])
        .env("TZ", tz)
        .args(args)
        .current_dir(root)
        .output()
        .unwrap()
}

#[test]
fn matrix_reports_per_directory_totals() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = diverged_repo(tmp.path());
    let config = write_config(tmp.path());

    let output = branchdrift(tmp.path(), &repo, &config, &["--format", "json", "matrix"]);
    assert!(
        output.status.success(),
        "matrix failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let row = &json["rows"][0];
    assert_eq!(row["branch"], "feature");
    assert_eq!(row["cells"][0]["directory"], "engine");
    assert_eq!(row["cells"][0]["total"], 2);
    assert_eq!(row["cells"][1]["total"], 1);
    assert_eq!(row["total"], 3);

    // The cache lives where [cache] dir points, relative to the repository.
    assert!(tmp.path().join("cache").is_dir());
}

#[test]
fn repeated_matrix_gives_the_same_answer() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = diverged_repo(tmp.path());
    let config = write_config(tmp.path());

    let first = branchdrift(tmp.path(), &repo, &config, &["--format", "json", "matrix"]);
    let second = branchdrift(tmp.path(), &repo, &config, &["--format", "json", "matrix"]);
    assert!(second.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn unknown_branch_fails_with_git_error() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = diverged_repo(tmp.path());
    let config = write_config(tmp.path());

    let output = branchdrift(tmp.path(), &repo, &config, &["matrix", "--base", "nope"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rev-parse"), "stderr was: {stderr}");
}

#[test]
fn timeline_lists_each_branch() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = diverged_repo(tmp.path());
    let config = write_config(tmp.path());

    let output = branchdrift(tmp.path(), &repo, &config, &["--format", "json", "timeline"]);
    assert!(
        output.status.success(),
        "timeline failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "ready");
    let series = json["branches"]["feature"].as_array().unwrap();
    assert!(!series.is_empty());
    assert_eq!(series[0]["total"], 3);
}

#[test]
fn history_steps_back_until_base_history_ends() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = dated_repo(tmp.path());
    let config = write_config(tmp.path());

    let args = [
        "--format",
        "json",
        "history",
        "--base-commit",
        "main",
        "--compare-commit",
        "feature",
        "--dir",
        "engine",
    ];
    let json = json_stdout(&branchdrift(tmp.path(), &repo, &config, &args));
    let points = json.as_array().unwrap();

    // 2023-12-29 predates c0, so sampling stops after four points.
    let dates: Vec<_> = points.iter().map(|p| p["date"].as_str().unwrap()).collect();
    assert_eq!(dates, ["2024-01-10", "2024-01-07", "2024-01-04", "2024-01-01"]);
    let totals: Vec<_> = points.iter().map(|p| p["total"].as_u64().unwrap()).collect();
    assert_eq!(totals, [2, 0, 0, 0]);
    assert_ne!(points[0]["compareCommit"], "feature");
    assert_eq!(points[0]["compareCommit"].as_str().unwrap().len(), 40);
}

#[test]
fn history_honours_sample_options() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = dated_repo(tmp.path());
    let config = write_config(tmp.path());

    let output = branchdrift(
        tmp.path(),
        &repo,
        &config,
        &[
            "--format", "json", "history", "--base-commit", "main", "--compare-commit",
            "feature", "--dir", "engine", "--samples", "2", "--interval", "9",
        ],
    );
    let json = json_stdout(&output);
    let dates: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["date"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(dates, ["2024-01-10", "2024-01-01"]);
}

#[test]
fn history_dates_do_not_depend_on_local_time_zone() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    std::fs::create_dir_all(repo.join("engine")).unwrap();
    git(&repo, &["init", "-q"]);
    git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(repo.join("engine/a.txt"), "one\n").unwrap();
    // Already 01-02 in UTC+05:30.
    commit_at(&repo, "2024-01-01 20:00:00 +0000", "late evening");
    let config = write_config(tmp.path());

    let args = [
        "--format",
        "json",
        "history",
        "--base-commit",
        "main",
        "--compare-commit",
        "main",
        "--dir",
        "engine",
    ];
    // POSIX zone strings, so no tz database is needed.
    for tz in ["UTC", "IST-5:30", "PST8"] {
        let json = json_stdout(&branchdrift_in_zone(tz, tmp.path(), &repo, &config, &args));
        let points = json.as_array().unwrap();
        assert_eq!(points.len(), 1, "TZ={tz}: {json}");
        assert_eq!(points[0]["date"], "2024-01-01", "TZ={tz}");
    }
}

#[test]
fn history_follows_a_branch_that_moved() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = diverged_repo(tmp.path());
    let config = write_config(tmp.path());
    let args = [
        "--format",
        "json",
        "history",
        "--base-commit",
        "main",
        "--compare-commit",
        "feature",
        "--dir",
        "engine",
        "--samples",
        "1",
    ];

    let before = json_stdout(&branchdrift(tmp.path(), &repo, &config, &args));
    assert_eq!(before[0]["total"], 2);

    git(&repo, &["checkout", "-q", "feature"]);
    std::fs::write(
        repo.join("engine/a.txt"),
        "one\ntwo\nthree\nfour\nfive\nsix\nseven\neight\n",
    )
    .unwrap();
    git(&repo, &["commit", "-q", "-am", "grow engine again"]);
    git(&repo, &["checkout", "-q", "main"]);

    let after = json_stdout(&branchdrift(tmp.path(), &repo, &config, &args));
    assert_ne!(after[0]["compareCommit"], before[0]["compareCommit"]);
    assert_eq!(after[0]["total"], 5);
}

#[test]
fn diff_reports_files_commit_info_and_subjects() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = dated_repo(tmp.path());
    let config = write_config(tmp.path());

    let output = branchdrift(
        tmp.path(),
        &repo,
        &config,
        &[
            "--format", "json", "diff", "--base-commit", "main", "--compare-commit",
            "feature", "--dir", "engine",
        ],
    );
    let json = json_stdout(&output);

    assert_eq!(json["baseBranch"], "main");
    assert_eq!(json["compareBranch"], "feature");
    assert_eq!(json["directory"], "engine");
    assert!(json["commitInfo"].as_str().unwrap().contains("f1"));

    let files = json["files"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["file"], "engine/a.txt");
    assert_eq!(files[0]["insertions"], 2);
    assert_eq!(json["files"]["total"], 2);

    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0]["subject"], "f1");
    assert_eq!(history[1]["subject"], "c0");
}

#[test]
fn diff_rejects_an_unknown_revision() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = dated_repo(tmp.path());
    let config = write_config(tmp.path());

    let output = branchdrift(
        tmp.path(),
        &repo,
        &config,
        &["diff", "--base-commit", "main", "--compare-commit", "nope", "--dir", "engine"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope^{commit}"), "stderr was: {stderr}");
}
