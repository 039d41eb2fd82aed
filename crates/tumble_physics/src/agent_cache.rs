//! Fixed-size cache of per-pair narrow-phase state
//!
//! Each overlapping body pair gets a [`CollisionAgent`] holding whatever the
//! narrow phase wants to keep between frames. Slots are picked by an
//! order-independent hash of the two body keys. A slot held by a different
//! pair that was active last frame is not stolen; the newcomer gets the
//! shared spare agent instead, which is wiped on every hand-out.

use slotmap::Key;
use tumble_math::Vec3;

use crate::body::BodyKey;
use crate::shapes::ShapeType;

/// A body taking part in a pair lookup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyRef {
    pub key: BodyKey,
    pub shape_type: ShapeType,
}

impl BodyRef {
    pub fn new(key: BodyKey, shape_type: ShapeType) -> Self {
        Self { key, shape_type }
    }
}

/// Order a pair so the lesser shape type comes first, then the lesser key
pub fn canonical_pair(a: BodyRef, b: BodyRef) -> (BodyRef, BodyRef) {
    if (b.shape_type, b.key) < (a.shape_type, a.key) {
        (b, a)
    } else {
        (a, b)
    }
}

/// Narrow-phase state kept warm for one body pair
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionAgent {
    /// Canonically ordered bodies this agent belongs to
    pub pair: (BodyKey, BodyKey),
    /// Frame in which the agent was last handed out
    pub last_used: u64,
    /// Last axis (in shape A's frame) that separated the pair
    pub separating_axis: Option<Vec3>,
    /// Consecutive frames the pair has produced a contact
    pub frames_in_contact: u32,
}

impl CollisionAgent {
    pub fn new(pair: (BodyKey, BodyKey), frame: u64) -> Self {
        Self {
            pair,
            last_used: frame,
            separating_axis: None,
            frames_in_contact: 0,
        }
    }

    /// Fresh agent for two bodies in canonical order
    pub fn for_bodies(a: BodyRef, b: BodyRef, frame: u64) -> Self {
        let (first, second) = canonical_pair(a, b);
        Self::new((first.key, second.key), frame)
    }

    pub fn involves(&self, key: BodyKey) -> bool {
        self.pair.0 == key || self.pair.1 == key
    }

    fn reset(&mut self, pair: (BodyKey, BodyKey), frame: u64) {
        *self = Self::new(pair, frame);
    }
}

/// How a lookup was served
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The slot already held this pair
    Hit,
    /// The slot was empty or stale and now holds this pair
    Claimed,
    /// The slot is held by another active pair; the spare agent was used
    Spare,
}

/// Lookup counters since creation or the last [`AgentCache::clear`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub claims: u64,
    pub evictions: u64,
    pub spares: u64,
}

/// Per-world cache of collision agents
#[derive(Clone, Debug)]
pub struct AgentCache {
    slots: Vec<Option<CollisionAgent>>,
    spare: CollisionAgent,
    stats: CacheStats,
}

impl AgentCache {
    /// Create a cache with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            spare: CollisionAgent::new((BodyKey::null(), BodyKey::null()), 0),
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Agent for the pair `(a, b)` in `frame`; argument order doesn't matter
    pub fn get_agent(&mut self, a: BodyRef, b: BodyRef, frame: u64) -> (&mut CollisionAgent, LookupOutcome) {
        let (first, second) = canonical_pair(a, b);
        let pair = (first.key, second.key);
        let index = self.slot_index(pair);

        let outcome = match &self.slots[index] {
            Some(agent) if agent.pair == pair => LookupOutcome::Hit,
            Some(agent) if frame.saturating_sub(agent.last_used) > 1 => {
                log::debug!(
                    "Evicting agent for {:?} (idle since frame {}) in favour of {:?}",
                    agent.pair,
                    agent.last_used,
                    pair
                );
                self.stats.evictions += 1;
                LookupOutcome::Claimed
            }
            Some(agent) => {
                log::debug!("Slot {} contested by {:?} and {:?}, using spare agent", index, agent.pair, pair);
                LookupOutcome::Spare
            }
            None => LookupOutcome::Claimed,
        };

        match outcome {
            LookupOutcome::Hit => {
                self.stats.hits += 1;
                let agent = self.slots[index].get_or_insert_with(|| CollisionAgent::new(pair, frame));
                agent.last_used = frame;
                (agent, outcome)
            }
            LookupOutcome::Claimed => {
                self.stats.claims += 1;
                (self.slots[index].insert(CollisionAgent::new(pair, frame)), outcome)
            }
            LookupOutcome::Spare => {
                self.stats.spares += 1;
                self.spare.reset(pair, frame);
                (&mut self.spare, outcome)
            }
        }
    }

    /// Drop every agent that refers to `key`
    ///
    /// Must be called when a body is destroyed so a later pair reusing the
    /// slot never sees its state.
    pub fn invalidate(&mut self, key: BodyKey) {
        for slot in self.slots.iter_mut() {
            if slot.as_ref().is_some_and(|agent| agent.involves(key)) {
                *slot = None;
            }
        }
        if self.spare.involves(key) {
            self.spare.reset((BodyKey::null(), BodyKey::null()), 0);
        }
    }

    /// Empty every slot and reset the counters
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.spare.reset((BodyKey::null(), BodyKey::null()), 0);
        self.stats = CacheStats::default();
    }

    pub fn agents(&self) -> impl Iterator<Item = &CollisionAgent> {
        self.slots.iter().flatten()
    }

    fn slot_index(&self, pair: (BodyKey, BodyKey)) -> usize {
        // Addition commutes, so (a, b) and (b, a) land in the same slot
        let hash = mix(pair.0.data().as_ffi()).wrapping_add(mix(pair.1.data().as_ffi()));
        (hash % self.slots.len() as u64) as usize
    }
}

/// splitmix64 finalizer
fn mix(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
