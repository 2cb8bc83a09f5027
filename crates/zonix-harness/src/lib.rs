#![forbid(unsafe_code)]
//! Data-driven scenarios for the Zonix engine.
//!
//! A scenario is a JSON document with three parts: volume parameters, a
//! directory tree to build on the in-memory store, and a list of
//! operations with the outcome each expects. The runner executes the
//! steps in order against a [`Volume`] and reports per-step results plus
//! a final leak sweep over every node the run touched.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use zonix::memory::{MemFs, ROOT};
use zonix::{
    BlockSize, DeviceId, DirIndex, FsError, InodeNumber, Name, NodeCache, SuperParams, Uid,
    Volume, ZoneGeometry, ZoneMap,
};

// ── scenario model ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub geometry: GeometrySpec,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub tree: Vec<TreeNode>,
    pub ops: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometrySpec {
    pub block_size: u32,
    pub log_zone_size: u8,
}

impl Default for GeometrySpec {
    fn default() -> Self {
        // 1 KiB blocks in 4 KiB zones.
        Self {
            block_size: 1024,
            log_zone_size: 2,
        }
    }
}

/// One node of the initial tree. Paths are slash-separated and relative
/// to the root; parents must be listed before their children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Dir {
        path: String,
    },
    File {
        path: String,
        #[serde(default)]
        size: u64,
    },
    Symlink {
        path: String,
        target: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub op: Op,
    #[serde(default)]
    pub expect: Expect,
}

/// One engine operation. Directory fields name a directory by path (empty
/// string for the root); name fields are the leaf passed through to the
/// engine, so reserved and oversized names reach it unfiltered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Link {
        target: String,
        dir: String,
        name: String,
        #[serde(default)]
        as_root: bool,
    },
    Unlink {
        dir: String,
        name: String,
    },
    Rmdir {
        dir: String,
        name: String,
    },
    Rename {
        old_dir: String,
        old_name: String,
        new_dir: String,
        new_name: String,
    },
    /// `end == 0` truncates the file to `start`; any other `end` punches
    /// the byte range `[start, end)` without changing the size.
    Ftrunc {
        path: String,
        start: u64,
        end: u64,
    },
    ReadLink {
        path: String,
    },
}

/// Expected step outcome: `"ok"` or `{"error": "<tag>"}` using the error
/// tags from [`FsError::tag`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    #[default]
    Ok,
    Error(String),
}

impl Expect {
    fn tag(&self) -> &str {
        match self {
            Expect::Ok => "ok",
            Expect::Error(tag) => tag,
        }
    }
}

// ── report ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub steps: Vec<StepReport>,
    pub passed: u32,
    pub failed: u32,
    /// Node handles still held after the last step; always zero for a
    /// well-behaved engine.
    pub leaked_holds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub op: String,
    pub expected: String,
    pub outcome: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A finished run: the report plus the live store and volume, so tests
/// can assert on the resulting tree.
pub struct ScenarioRun {
    pub fs: Arc<MemFs>,
    pub volume: Volume,
    pub report: ScenarioReport,
}

// ── loading and running ─────────────────────────────────────────────────

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("invalid scenario json {}", path.display()))
}

pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioRun> {
    for (index, step) in scenario.ops.iter().enumerate() {
        if let Expect::Error(tag) = &step.expect {
            if error_by_tag(tag).is_none() {
                bail!("step {index}: unknown error tag {tag:?}");
            }
        }
    }

    let block_size = BlockSize::new(scenario.geometry.block_size)
        .with_context(|| format!("scenario {}: bad block size", scenario.name))?;
    let geometry = ZoneGeometry::new(block_size, scenario.geometry.log_zone_size)
        .with_context(|| format!("scenario {}: bad zone geometry", scenario.name))?;

    let fs = MemFs::new(DeviceId(1), geometry);
    let volume = Volume::new(
        SuperParams {
            read_only: scenario.read_only,
            ..fs.params()
        },
        fs.clone() as Arc<dyn NodeCache>,
        fs.clone() as Arc<dyn DirIndex>,
        fs.clone() as Arc<dyn ZoneMap>,
    );

    let mut touched = BTreeSet::from([ROOT]);
    for node in &scenario.tree {
        let number = build_node(&fs, node)
            .with_context(|| format!("scenario {}: building tree", scenario.name))?;
        touched.insert(number);
    }

    let mut steps = Vec::with_capacity(scenario.ops.len());
    let mut passed = 0_u32;
    let mut failed = 0_u32;
    for (index, step) in scenario.ops.iter().enumerate() {
        let outcome = execute(&volume, &fs, &step.op, &mut touched)
            .with_context(|| format!("scenario {}: step {index}", scenario.name))?;

        let (outcome_tag, detail) = match outcome {
            Ok(detail) => ("ok".to_owned(), detail),
            Err(err) => (err.tag().to_owned(), None),
        };
        let ok = outcome_tag == step.expect.tag();
        if ok {
            passed += 1;
        } else {
            failed += 1;
        }
        steps.push(StepReport {
            index,
            op: describe(&step.op),
            expected: step.expect.tag().to_owned(),
            outcome: outcome_tag,
            passed: ok,
            detail,
        });
    }

    let leaked_holds = touched.iter().map(|&node| fs.live_holds(node)).sum();
    let report = ScenarioReport {
        scenario: scenario.name.clone(),
        steps,
        passed,
        failed,
        leaked_holds,
    };
    Ok(ScenarioRun { fs, volume, report })
}

fn build_node(fs: &MemFs, node: &TreeNode) -> Result<InodeNumber> {
    let (parent_path, leaf) = split_parent(node.path());
    let parent = resolve_node(fs, parent_path)?;
    let number = match node {
        TreeNode::Dir { .. } => fs.create_dir(parent, leaf),
        TreeNode::File { size, .. } => fs.create_file(parent, leaf, *size),
        TreeNode::Symlink { target, .. } => fs.create_symlink(parent, leaf, target),
    };
    number.with_context(|| format!("creating {:?}", node.path()))
}

impl TreeNode {
    fn path(&self) -> &str {
        match self {
            TreeNode::Dir { path }
            | TreeNode::File { path, .. }
            | TreeNode::Symlink { path, .. } => path,
        }
    }
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    }
}

/// Walk `path` from the root. Operation paths must resolve at the moment
/// their step runs; a dangling path is a scenario error, not an engine
/// outcome.
fn resolve_node(fs: &MemFs, path: &str) -> Result<InodeNumber> {
    let mut current = ROOT;
    for component in path.split('/').filter(|c| !c.is_empty()) {
        current = fs
            .resolve(current, component)
            .with_context(|| format!("path {path:?}: no entry {component:?}"))?;
    }
    Ok(current)
}

fn error_by_tag(tag: &str) -> Option<FsError> {
    FsError::all().iter().copied().find(|err| err.tag() == tag)
}

fn parse_name(raw: &str) -> std::result::Result<Name, FsError> {
    Name::new(raw).map_err(FsError::from)
}

/// Run one operation. The outer error is a malformed scenario (dangling
/// path); the inner one is the engine outcome under test. `Ok(Some(_))`
/// carries human-readable output, currently only the read-link target.
fn execute(
    volume: &Volume,
    fs: &MemFs,
    op: &Op,
    touched: &mut BTreeSet<InodeNumber>,
) -> Result<std::result::Result<Option<String>, FsError>> {
    match op {
        Op::Link {
            target,
            dir,
            name,
            as_root,
        } => {
            let target = resolve_node(fs, target)?;
            let dir = resolve_node(fs, dir)?;
            touched.extend([target, dir]);
            let caller = if *as_root { Uid::ROOT } else { Uid(1000) };
            Ok(parse_name(name)
                .and_then(|leaf| volume.link(caller, target, dir, &leaf))
                .map(|()| None))
        }
        Op::Unlink { dir, name } => {
            let dir = resolve_node(fs, dir)?;
            touched.insert(dir);
            if let Some(node) = fs.resolve(dir, name) {
                touched.insert(node);
            }
            Ok(parse_name(name)
                .and_then(|leaf| volume.unlink(dir, &leaf))
                .map(|()| None))
        }
        Op::Rmdir { dir, name } => {
            let dir = resolve_node(fs, dir)?;
            touched.insert(dir);
            if let Some(node) = fs.resolve(dir, name) {
                touched.insert(node);
            }
            Ok(parse_name(name)
                .and_then(|leaf| volume.rmdir(dir, &leaf))
                .map(|()| None))
        }
        Op::Rename {
            old_dir,
            old_name,
            new_dir,
            new_name,
        } => {
            let old_dir = resolve_node(fs, old_dir)?;
            let new_dir = resolve_node(fs, new_dir)?;
            touched.extend([old_dir, new_dir]);
            if let Some(node) = fs.resolve(old_dir, old_name) {
                touched.insert(node);
            }
            if let Some(node) = fs.resolve(new_dir, new_name) {
                touched.insert(node);
            }
            Ok(parse_name(old_name)
                .and_then(|old| {
                    parse_name(new_name)
                        .and_then(|new| volume.rename(old_dir, &old, new_dir, &new))
                })
                .map(|()| None))
        }
        Op::Ftrunc { path, start, end } => {
            let node = resolve_node(fs, path)?;
            touched.insert(node);
            let outcome = if *end == 0 {
                volume.truncate(node, *start)
            } else {
                volume.punch_hole(node, *start, *end)
            };
            Ok(outcome.map(|()| None))
        }
        Op::ReadLink { path } => {
            let node = resolve_node(fs, path)?;
            touched.insert(node);
            let mut buf = [0_u8; 256];
            Ok(volume.read_link(node, &mut buf).map(|len| {
                Some(String::from_utf8_lossy(&buf[..len]).into_owned())
            }))
        }
    }
}

fn describe(op: &Op) -> String {
    fn at(dir: &str, name: &str) -> String {
        if dir.is_empty() {
            name.to_owned()
        } else {
            format!("{dir}/{name}")
        }
    }
    match op {
        Op::Link {
            target, dir, name, ..
        } => format!("link {target} -> {}", at(dir, name)),
        Op::Unlink { dir, name } => format!("unlink {}", at(dir, name)),
        Op::Rmdir { dir, name } => format!("rmdir {}", at(dir, name)),
        Op::Rename {
            old_dir,
            old_name,
            new_dir,
            new_name,
        } => format!(
            "rename {} -> {}",
            at(old_dir, old_name),
            at(new_dir, new_name)
        ),
        Op::Ftrunc { path, start, end } if *end == 0 => format!("truncate {path} to {start}"),
        Op::Ftrunc { path, start, end } => format!("punch {path} [{start}, {end})"),
        Op::ReadLink { path } => format!("readlink {path}"),
    }
}

/// A small end-to-end scenario exercising every operation kind, also
/// emitted by `zonix-harness sample` as a starting point for new files.
#[must_use]
pub fn sample_scenario() -> Scenario {
    Scenario {
        name: "sample".to_owned(),
        geometry: GeometrySpec::default(),
        read_only: false,
        tree: vec![
            TreeNode::Dir {
                path: "docs".to_owned(),
            },
            TreeNode::File {
                path: "docs/notes".to_owned(),
                size: 10_000,
            },
            TreeNode::File {
                path: "docs/C.mode".to_owned(),
                size: 0,
            },
            TreeNode::Dir {
                path: "archive".to_owned(),
            },
            TreeNode::Symlink {
                path: "latest".to_owned(),
                target: "docs/notes".to_owned(),
            },
        ],
        ops: vec![
            Step {
                op: Op::ReadLink {
                    path: "latest".to_owned(),
                },
                expect: Expect::Ok,
            },
            Step {
                op: Op::Link {
                    target: "docs/notes".to_owned(),
                    dir: "archive".to_owned(),
                    name: "notes".to_owned(),
                    as_root: false,
                },
                expect: Expect::Ok,
            },
            // The docs directory carries a backup marker: this unlink
            // renames the file to notes.bak instead of deleting it.
            Step {
                op: Op::Unlink {
                    dir: "docs".to_owned(),
                    name: "notes".to_owned(),
                },
                expect: Expect::Ok,
            },
            Step {
                op: Op::Unlink {
                    dir: "docs".to_owned(),
                    name: "notes.bak".to_owned(),
                },
                expect: Expect::Ok,
            },
            Step {
                op: Op::Ftrunc {
                    path: "archive/notes".to_owned(),
                    start: 0,
                    end: 4_096,
                },
                expect: Expect::Ok,
            },
            Step {
                op: Op::Ftrunc {
                    path: "archive/notes".to_owned(),
                    start: 100,
                    end: 0,
                },
                expect: Expect::Ok,
            },
            Step {
                op: Op::Rename {
                    old_dir: "archive".to_owned(),
                    old_name: "notes".to_owned(),
                    new_dir: String::new(),
                    new_name: "notes".to_owned(),
                },
                expect: Expect::Ok,
            },
            Step {
                op: Op::Rmdir {
                    dir: String::new(),
                    name: "docs".to_owned(),
                },
                expect: Expect::Error("not_empty".to_owned()),
            },
            Step {
                op: Op::Unlink {
                    dir: "docs".to_owned(),
                    name: "C.mode".to_owned(),
                },
                expect: Expect::Ok,
            },
            Step {
                op: Op::Rmdir {
                    dir: String::new(),
                    name: "docs".to_owned(),
                },
                expect: Expect::Ok,
            },
        ],
    }
}
