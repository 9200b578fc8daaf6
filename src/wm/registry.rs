//! Frame/client registry
//!
//! A frame and the client it wraps form one entity with two handles. The
//! registry stores each entity once, keyed by frame, with a secondary index
//! from client to frame, so either handle's teardown finds the same entry.

use std::collections::HashMap;

use thiserror::Error;

use crate::wm::backend::{GcId, WindowId};

/// A decorated client and its container window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame: WindowId,
    pub client: WindowId,
    /// Drawing context, absent when allocation failed
    pub gc: Option<GcId>,
    /// Cached client title
    pub title: Option<String>,
}

impl Frame {
    pub fn new(frame: WindowId, client: WindowId, gc: Option<GcId>) -> Self {
        Self { frame, client, gc, title: None }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("frame 0x{0:x} is already registered")]
    DuplicateFrame(WindowId),
    #[error("client 0x{0:x} already has a frame")]
    DuplicateClient(WindowId),
}

#[derive(Debug, Default)]
pub struct Registry {
    frames: HashMap<WindowId, Frame>,
    by_client: HashMap<WindowId, WindowId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: Frame) -> Result<(), RegistryError> {
        if self.frames.contains_key(&entry.frame) {
            return Err(RegistryError::DuplicateFrame(entry.frame));
        }
        if self.by_client.contains_key(&entry.client) {
            return Err(RegistryError::DuplicateClient(entry.client));
        }
        self.by_client.insert(entry.client, entry.frame);
        self.frames.insert(entry.frame, entry);
        Ok(())
    }

    pub fn by_frame(&self, frame: WindowId) -> Option<&Frame> {
        self.frames.get(&frame)
    }

    pub fn by_frame_mut(&mut self, frame: WindowId) -> Option<&mut Frame> {
        self.frames.get_mut(&frame)
    }

    pub fn by_client(&self, client: WindowId) -> Option<&Frame> {
        self.by_client.get(&client).and_then(|f| self.frames.get(f))
    }

    /// Entry for `window` whether it is the frame or the client
    pub fn find(&self, window: WindowId) -> Option<&Frame> {
        self.by_frame(window).or_else(|| self.by_client(window))
    }

    pub fn find_mut(&mut self, window: WindowId) -> Option<&mut Frame> {
        let frame = if self.frames.contains_key(&window) {
            window
        } else {
            *self.by_client.get(&window)?
        };
        self.frames.get_mut(&frame)
    }

    pub fn is_frame(&self, window: WindowId) -> bool {
        self.frames.contains_key(&window)
    }

    /// Remove the entity addressed by either of its handles
    pub fn remove(&mut self, window: WindowId) -> Option<Frame> {
        let frame = if self.frames.contains_key(&window) {
            window
        } else {
            *self.by_client.get(&window)?
        };
        let entry = self.frames.remove(&frame)?;
        self.by_client.remove(&entry.client);
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.values()
    }

    /// Both indexes describe the same set of entries
    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        self.frames.len() == self.by_client.len()
            && self
                .frames
                .iter()
                .all(|(frame, entry)| entry.frame == *frame && self.by_client.get(&entry.client) == Some(frame))
    }
}
