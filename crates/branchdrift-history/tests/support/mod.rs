//! A scripted stand-in for git that counts every invocation.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use branchdrift_cache::DiffCache;
use branchdrift_core::DriftError;
use branchdrift_gitstat::git::Git;
use branchdrift_gitstat::runner::CommandRunner;
use branchdrift_history::{DiffComputer, HistorySampler};
use chrono::{DateTime, NaiveDate, Utc};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Default)]
pub struct FakeRepo {
    refs: HashMap<String, String>,
    timestamps: HashMap<String, i64>,
    first_parent: HashMap<String, Vec<(NaiveDate, String)>>,
    shortstats: HashMap<(String, String, String), String>,
    numstat: String,
    slow: HashMap<String, Duration>,
    fail_diffs: bool,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// `name` resolves to `tip` via rev-parse.
    pub fn branch(mut self, name: &str, tip: &str) -> Self {
        self.refs.insert(name.into(), tip.into());
        self
    }

    /// First-parent history of `tip`, each commit committed at noon UTC on
    /// its date. Every listed commit gets that timestamp.
    pub fn history(mut self, tip: &str, commits: &[(NaiveDate, &str)]) -> Self {
        let mut chain: Vec<(NaiveDate, String)> = commits
            .iter()
            .map(|(d, id)| (*d, (*id).to_string()))
            .collect();
        chain.sort_by(|a, b| b.0.cmp(&a.0));
        for (d, id) in &chain {
            let ts = d.and_hms_opt(12, 0, 0).unwrap().and_utc().timestamp();
            self.timestamps.insert(id.clone(), ts);
        }
        self.first_parent.insert(tip.into(), chain);
        self
    }

    pub fn shortstat(mut self, base: &str, compare: &str, dir: &str, output: &str) -> Self {
        self.shortstats
            .insert((base.into(), compare.into(), dir.into()), output.into());
        self
    }

    pub fn numstat(mut self, output: &str) -> Self {
        self.numstat = output.into();
        self
    }

    /// Every first-parent query on `tip` sleeps for `delay`.
    pub fn slow(mut self, tip: &str, delay: Duration) -> Self {
        self.slow.insert(tip.into(), delay);
        self
    }

    pub fn failing_diffs(mut self) -> Self {
        self.fail_diffs = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn count_of(&self, verb: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.first().map(String::as_str) == Some(verb))
            .count()
    }

    fn fail(args: &[String], stderr: &str) -> DriftError {
        DriftError::CommandFailure {
            command: format!("git {}", args.join(" ")),
            status: "exit status: 128".into(),
            stderr: stderr.into(),
        }
    }

    fn rev_list(&self, args: &[String]) -> Result<String, DriftError> {
        let commit = &args[1];
        if args.iter().any(|a| a == "--timestamp") {
            let ts = self.timestamps.get(commit).copied().unwrap_or(0);
            return Ok(format!("{ts} {commit}\n"));
        }

        if let Some(delay) = self.slow.get(commit) {
            std::thread::sleep(*delay);
        }
        let until = args
            .iter()
            .find_map(|a| a.strip_prefix("--until="))
            .and_then(|v| DateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S %z").ok())
            .map(|bound| bound.with_timezone(&Utc).date_naive())
            .ok_or_else(|| Self::fail(args, "bad --until"))?;
        let ancestor = self
            .first_parent
            .get(commit)
            .and_then(|chain| chain.iter().find(|(d, _)| *d <= until))
            .map(|(_, id)| format!("{id}\n"))
            .unwrap_or_default();
        Ok(ancestor)
    }

    fn diff(&self, args: &[String]) -> Result<String, DriftError> {
        if self.fail_diffs {
            return Err(Self::fail(args, "fatal: bad object"));
        }
        let format_at = args
            .iter()
            .position(|a| a == "--shortstat" || a == "--numstat")
            .ok_or_else(|| Self::fail(args, "no format"))?;
        if args[format_at] == "--numstat" {
            return Ok(self.numstat.clone());
        }
        let base = args[format_at + 1].clone();
        let compare = args[format_at + 2].clone();
        let dir = args.get(format_at + 4).cloned().unwrap_or_default();
        Ok(self
            .shortstats
            .get(&(base, compare, dir))
            .cloned()
            .unwrap_or_default())
    }
}

impl CommandRunner for FakeRepo {
    fn run(&self, args: &[String]) -> Result<String, DriftError> {
        self.calls.lock().unwrap().push(args.to_vec());
        match args.first().map(String::as_str) {
            Some("rev-parse") if args[1] == "--verify" => {
                let rev = args[2].trim_end_matches("^{commit}");
                self.refs
                    .get(rev)
                    .cloned()
                    .or_else(|| self.timestamps.contains_key(rev).then(|| rev.to_string()))
                    .map(|commit| format!("{commit}\n"))
                    .ok_or_else(|| Self::fail(args, "fatal: Needed a single revision"))
            }
            Some("rev-parse") => self
                .refs
                .get(&args[1])
                .map(|tip| format!("{tip}\n"))
                .ok_or_else(|| Self::fail(args, "fatal: ambiguous argument")),
            Some("rev-list") => self.rev_list(args),
            Some("diff") => self.diff(args),
            Some("log") if args.iter().any(|a| a == "--pretty=oneline") => {
                Ok(format!("{} Subject of {}\n", args[1], args[1]))
            }
            Some("log") => Ok(format!("commit {}\nAuthor: Dev <dev@example.com>\n", args[1])),
            Some("name-rev") => {
                let commit = &args[2];
                let name = self
                    .refs
                    .iter()
                    .find(|(_, tip)| *tip == commit)
                    .map(|(name, _)| format!("remotes/origin/{name}"))
                    .unwrap_or_else(|| commit.clone());
                Ok(format!("{name}\n"))
            }
            _ => Err(Self::fail(args, "unknown command")),
        }
    }
}

pub fn sampler(repo: &Arc<FakeRepo>, cache_root: &std::path::Path) -> HistorySampler {
    let git = Git::new(repo.clone());
    HistorySampler::new(DiffComputer::new(git, DiffCache::new(cache_root)))
}
