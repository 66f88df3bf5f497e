//! Cyclic object pool for transient per-frame objects (tracers, decals, sparks).
//!
//! Nodes live in a slab and are never freed while the pool lives; they only
//! move between two intrusive rings, "available" and "in use". Once the pool
//! reaches `max_size`, [`CyclicPool::acquire`] recycles the oldest in-use
//! payload instead of failing.
//!
//! # Reclaim contract
//! A reclaimed payload is taken from its previous holder without notice other
//! than the `on_take` callback. The previous holder's [`PoolHandle`] then
//! refers to the new holder's node; holders must stop using their handle once
//! `on_take` has fired for its payload.

use bevy::prelude::*;
use thiserror::Error;

/// Stable reference to one pool node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(u32);

impl PoolHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Errors surfaced by [`CyclicPool::release`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool handle {0:?} is not in use")]
    NotInUse(PoolHandle),
    #[error("pool handle {0:?} does not belong to this pool")]
    UnknownHandle(PoolHandle),
}

/// Ring membership of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Available,
    InUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Links {
    prev: PoolHandle,
    next: PoolHandle,
}

struct PoolNode<T> {
    payload: T,
    /// `None` while detached; a lone ring member links to itself.
    links: Option<Links>,
    state: NodeState,
}

/// Circular doubly linked ring over a node slab, referenced by its first node.
///
/// The ring only stores its head; the links live in the nodes so that append,
/// pop-front and removal of an arbitrary member are all O(1).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RingQueue {
    head: Option<PoolHandle>,
    len: usize,
}

impl RingQueue {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn front(&self) -> Option<PoolHandle> {
        self.head
    }

    fn push_back<T>(&mut self, nodes: &mut [PoolNode<T>], handle: PoolHandle) {
        match self.head {
            None => {
                nodes[handle.index()].links = Some(Links {
                    prev: handle,
                    next: handle,
                });
                self.head = Some(handle);
            }
            Some(head) => {
                let tail = links(nodes, head).prev;
                nodes[handle.index()].links = Some(Links {
                    prev: tail,
                    next: head,
                });
                links_mut(nodes, tail).next = handle;
                links_mut(nodes, head).prev = handle;
            }
        }
        self.len += 1;
    }

    fn pop_front<T>(&mut self, nodes: &mut [PoolNode<T>]) -> Option<PoolHandle> {
        let head = self.head?;
        self.remove(nodes, head);
        Some(head)
    }

    /// Unlinks `handle`, which must be a member of this ring.
    fn remove<T>(&mut self, nodes: &mut [PoolNode<T>], handle: PoolHandle) {
        let Links { prev, next } = links(nodes, handle);

        if next == handle {
            self.head = None;
        } else {
            links_mut(nodes, prev).next = next;
            links_mut(nodes, next).prev = prev;
            if self.head == Some(handle) {
                self.head = Some(next);
            }
        }

        nodes[handle.index()].links = None;
        self.len -= 1;
    }

    /// Members in ring order, starting at the head.
    fn handles<T>(&self, nodes: &[PoolNode<T>]) -> Vec<PoolHandle> {
        let mut out = Vec::with_capacity(self.len);
        let Some(head) = self.head else {
            return out;
        };
        let mut current = head;
        loop {
            out.push(current);
            current = links(nodes, current).next;
            if current == head {
                break;
            }
        }
        out
    }
}

fn links<T>(nodes: &[PoolNode<T>], handle: PoolHandle) -> Links {
    nodes[handle.index()]
        .links
        .unwrap_or(Links {
            prev: handle,
            next: handle,
        })
}

fn links_mut<T>(nodes: &mut [PoolNode<T>], handle: PoolHandle) -> &mut Links {
    nodes[handle.index()].links.get_or_insert(Links {
        prev: handle,
        next: handle,
    })
}

type Factory<T> = Box<dyn FnMut() -> T + Send + Sync>;
type Callback<T> = Box<dyn FnMut(&mut T) + Send + Sync>;

/// Reusable-handle pool with guaranteed availability.
///
/// # Example
/// ```
/// use bevy_ballistics_core::pool::CyclicPool;
///
/// let mut pool = CyclicPool::new(|| Vec::<f32>::new(), 4, 8)
///     .with_on_release(|samples: &mut Vec<f32>| samples.clear());
///
/// let handle = pool.acquire();
/// pool.get_mut(handle).unwrap().push(1.0);
/// pool.release(handle).unwrap();
/// assert_eq!(pool.available_count(), 4);
/// ```
#[derive(Resource)]
pub struct CyclicPool<T: Send + Sync + 'static> {
    nodes: Vec<PoolNode<T>>,
    available: RingQueue,
    in_use: RingQueue,
    max_size: usize,
    factory: Factory<T>,
    on_get: Option<Callback<T>>,
    on_take: Option<Callback<T>>,
    on_release: Option<Callback<T>>,
    on_destroy: Option<Callback<T>>,
}

impl<T: Send + Sync + 'static> CyclicPool<T> {
    /// Creates a pool and pre-warms `min(initial_count, max_size)` nodes.
    ///
    /// # Arguments
    /// * `factory` - Creates a payload whenever the pool needs a new node
    /// * `initial_count` - Number of nodes created up front
    /// * `max_size` - Node count past which in-use payloads are recycled.
    ///   Zero is raised to one, since `acquire` always hands out a payload.
    pub fn new(
        factory: impl FnMut() -> T + Send + Sync + 'static,
        initial_count: usize,
        max_size: usize,
    ) -> Self {
        let max_size = max_size.max(1);
        let mut pool = Self {
            nodes: Vec::with_capacity(max_size),
            available: RingQueue::default(),
            in_use: RingQueue::default(),
            max_size,
            factory: Box::new(factory),
            on_get: None,
            on_take: None,
            on_release: None,
            on_destroy: None,
        };

        for _ in 0..initial_count.min(max_size) {
            let handle = pool.create_node(NodeState::Available);
            pool.available.push_back(&mut pool.nodes, handle);
        }

        pool
    }

    /// Runs on every payload handed out by [`CyclicPool::acquire`].
    pub fn with_on_get(mut self, callback: impl FnMut(&mut T) + Send + Sync + 'static) -> Self {
        self.on_get = Some(Box::new(callback));
        self
    }

    /// Runs when an in-use payload is reclaimed from its previous holder.
    pub fn with_on_take(mut self, callback: impl FnMut(&mut T) + Send + Sync + 'static) -> Self {
        self.on_take = Some(Box::new(callback));
        self
    }

    /// Runs when a payload is returned with [`CyclicPool::release`].
    pub fn with_on_release(
        mut self,
        callback: impl FnMut(&mut T) + Send + Sync + 'static,
    ) -> Self {
        self.on_release = Some(Box::new(callback));
        self
    }

    /// Runs once per node when the pool is disposed or dropped.
    pub fn with_on_destroy(
        mut self,
        callback: impl FnMut(&mut T) + Send + Sync + 'static,
    ) -> Self {
        self.on_destroy = Some(Box::new(callback));
        self
    }

    fn create_node(&mut self, state: NodeState) -> PoolHandle {
        let handle = PoolHandle(self.nodes.len() as u32);
        let payload = (self.factory)();
        self.nodes.push(PoolNode {
            payload,
            links: None,
            state,
        });
        handle
    }

    /// Hands out a payload: pool hit, then reclaim-oldest, then allocate.
    ///
    /// Never fails. See the module docs for the reclaim contract.
    pub fn acquire(&mut self) -> PoolHandle {
        let handle = match self.available.pop_front(&mut self.nodes) {
            Some(handle) => handle,
            None if self.count() >= self.max_size => match self.in_use.pop_front(&mut self.nodes) {
                Some(handle) => {
                    if let Some(on_take) = self.on_take.as_mut() {
                        on_take(&mut self.nodes[handle.index()].payload);
                    }
                    handle
                }
                // Unreachable while max_size >= 1
                None => self.create_node(NodeState::InUse),
            },
            None => self.create_node(NodeState::InUse),
        };

        let node = &mut self.nodes[handle.index()];
        node.state = NodeState::InUse;
        if let Some(on_get) = self.on_get.as_mut() {
            on_get(&mut node.payload);
        }
        self.in_use.push_back(&mut self.nodes, handle);
        handle
    }

    /// Returns an in-use payload to the available ring in O(1).
    pub fn release(&mut self, handle: PoolHandle) -> Result<(), PoolError> {
        let Some(node) = self.nodes.get(handle.index()) else {
            return Err(PoolError::UnknownHandle(handle));
        };
        if node.state != NodeState::InUse {
            warn!("Ignoring release of pooled object {handle:?} that is not in use");
            return Err(PoolError::NotInUse(handle));
        }

        self.in_use.remove(&mut self.nodes, handle);
        self.available.push_back(&mut self.nodes, handle);

        let node = &mut self.nodes[handle.index()];
        node.state = NodeState::Available;
        if let Some(on_release) = self.on_release.as_mut() {
            on_release(&mut node.payload);
        }
        Ok(())
    }

    /// Moves every in-use node back to the available ring without callbacks.
    pub fn recall_all(&mut self) {
        while let Some(handle) = self.in_use.pop_front(&mut self.nodes) {
            self.nodes[handle.index()].state = NodeState::Available;
            self.available.push_back(&mut self.nodes, handle);
        }
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.nodes.get(handle.index()).map(|node| &node.payload)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.nodes
            .get_mut(handle.index())
            .map(|node| &mut node.payload)
    }

    pub fn state(&self, handle: PoolHandle) -> Option<NodeState> {
        self.nodes.get(handle.index()).map(|node| node.state)
    }

    pub fn is_in_use(&self, handle: PoolHandle) -> bool {
        self.state(handle) == Some(NodeState::InUse)
    }

    /// In-use handles, oldest first.
    pub fn in_use_handles(&self) -> Vec<PoolHandle> {
        self.in_use.handles(&self.nodes)
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }

    /// Total nodes owned by the pool (available + in use).
    pub fn count(&self) -> usize {
        self.available.len() + self.in_use.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Tears the pool down, running `on_destroy` once per node.
    pub fn dispose(self) {
        drop(self);
    }

    fn teardown(&mut self) {
        let mut order = self.in_use.handles(&self.nodes);
        order.extend(self.available.handles(&self.nodes));

        if let Some(on_destroy) = self.on_destroy.as_mut() {
            for handle in &order {
                on_destroy(&mut self.nodes[handle.index()].payload);
            }
        }

        self.in_use = RingQueue::default();
        self.available = RingQueue::default();
        self.nodes.clear();
    }
}

impl<T: Send + Sync + 'static> Drop for CyclicPool<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
