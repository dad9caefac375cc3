//! Textual set descriptions like `"btree pagesize=4096 mmap"`.
//!
//! A description starts with the kind of set (`btree`, `hash` or `packed`), followed by
//! options of that kind and at most one storage option:
//!
//! - `btree [pagesize=P]`
//! - `hash [capacity=N]`
//! - `packed [density=D] [order=O]`
//! - storage: `malloc` (heap, the default), `mmap` (temporary file) or `anon` (anonymous mapping)
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::{
    arena::{DynArena, HeapArena, MmapArena},
    btree::{BtreeConfig, BtreeSet},
    error::{Error, Result},
    hash::{ChainedHashSet, HashConfig},
    packed::{PackedConfig, PackedSet},
    set::Set,
};

/// Storage used for the arenas of a set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArenaKind {
    #[default]
    Heap,
    /// Memory mapped temporary file.
    TemporaryFile,
    /// Anonymous memory mapping.
    Anonymous,
}

impl ArenaKind {
    /// Create a new empty arena of this kind.
    pub fn create(&self) -> Result<DynArena> {
        let arena: DynArena = match self {
            ArenaKind::Heap => Box::new(HeapArena::new()),
            ArenaKind::TemporaryFile => Box::new(MmapArena::temporary()?),
            ArenaKind::Anonymous => Box::new(MmapArena::anonymous()),
        };
        Ok(arena)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetKind {
    Btree(BtreeConfig),
    Hash(HashConfig),
    Packed(PackedConfig),
}

/// Complete description of a set, see the [module documentation](self) for the textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetConfig {
    pub kind: SetKind,
    pub arena: ArenaKind,
}

impl SetConfig {
    pub fn new(kind: SetKind) -> SetConfig {
        SetConfig {
            kind,
            arena: ArenaKind::default(),
        }
    }

    pub fn arena(mut self, arena: ArenaKind) -> Self {
        self.arena = arena;
        self
    }

    /// Create an empty set as described.
    pub fn create(&self) -> Result<Box<dyn Set + Send>> {
        let set: Box<dyn Set + Send> = match &self.kind {
            SetKind::Btree(config) => Box::new(BtreeSet::with_arena(
                self.arena.create()?,
                config.clone(),
            )?),
            SetKind::Hash(config) => Box::new(ChainedHashSet::with_arena(
                self.arena.create()?,
                config.clone(),
            )?),
            SetKind::Packed(config) => Box::new(PackedSet::with_arena(config.clone(), self.arena)?),
        };
        Ok(set)
    }
}

fn invalid(description: &str, reason: &str) -> Error {
    Error::InvalidDescription(format!("{} in \"{}\"", reason, description))
}

fn parse_value<T: FromStr>(description: &str, option: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| invalid(description, &format!("invalid value for option {}", option)))
}

impl FromStr for SetConfig {
    type Err = Error;

    fn from_str(description: &str) -> Result<SetConfig> {
        let mut words = description.split_whitespace();
        let mut kind = match words.next() {
            Some("btree") => SetKind::Btree(BtreeConfig::default()),
            Some("hash") => SetKind::Hash(HashConfig::default()),
            Some("packed") => SetKind::Packed(PackedConfig::default()),
            Some(other) => return Err(invalid(description, &format!("unknown set kind {}", other))),
            None => return Err(invalid(description, "missing set kind")),
        };

        let mut arena = None;
        for word in words {
            let storage = match word {
                "malloc" => Some(ArenaKind::Heap),
                "mmap" => Some(ArenaKind::TemporaryFile),
                "anon" => Some(ArenaKind::Anonymous),
                _ => None,
            };
            if let Some(storage) = storage {
                if arena.replace(storage).is_some() {
                    return Err(invalid(description, "more than one storage option"));
                }
                continue;
            }

            let (option, value) = word
                .split_once('=')
                .ok_or_else(|| invalid(description, &format!("unknown option {}", word)))?;
            match (&mut kind, option) {
                (SetKind::Btree(c), "pagesize") => {
                    c.page_size = parse_value(description, option, value)?
                }
                (SetKind::Hash(c), "capacity") => {
                    c.buckets = parse_value(description, option, value)?
                }
                (SetKind::Packed(c), "density") => {
                    c.density = parse_value(description, option, value)?
                }
                (SetKind::Packed(c), "order") => {
                    c.initial_order = parse_value(description, option, value)?
                }
                _ => {
                    return Err(invalid(
                        description,
                        &format!("option {} is not supported for this kind of set", option),
                    ))
                }
            }
        }

        Ok(SetConfig {
            kind,
            arena: arena.unwrap_or_default(),
        })
    }
}
