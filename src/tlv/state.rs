//! Shared encoding/decoding state: the stack of open data values.

use super::header::{Header, Length};
use crate::tag::Tag;

/// The processing state of one data value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StateEntry {
    pub header: Header,
    /// How far into the value the codec has progressed, i.e. how many bytes
    /// have been read or written. Only the topmost entry is kept current;
    /// `State::pop` folds a finished child's progress into its parent.
    pub offset: usize,
    /// The maximum length the value may have: the length indicated by the
    /// header, restricted by every surrounding data value.
    /// [`Length::Indefinite`] if no restriction is known.
    pub length: Length,
}

impl StateEntry {
    /// The remaining number of bytes within the value, or
    /// [`Length::Indefinite`] if unknown.
    #[inline]
    pub fn remaining(&self) -> Length {
        self.length.sub(self.offset)
    }
}

/// The stack of data values currently being processed.
///
/// At the bottom of the stack sits a virtual constructed, indefinite-length
/// data value with tag 0 representing the stream as a whole.
#[derive(Debug)]
pub(crate) struct State {
    stack: Vec<StateEntry>,
    /// Top entry of the stack.
    pub curr: StateEntry,
}

const ROOT: StateEntry = StateEntry {
    header: Header {
        tag: Tag::END_OF_CONTENTS,
        constructed: true,
        length: Length::Indefinite,
    },
    offset: 0,
    length: Length::Indefinite,
};

impl State {
    pub fn new() -> State {
        State {
            stack: Vec::with_capacity(10),
            curr: ROOT,
        }
    }

    /// Clears the state back to the virtual root value. The allocated stack
    /// space is kept.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.curr = ROOT;
    }

    /// Whether the state is currently at the root level.
    #[inline]
    pub fn root(&self) -> bool {
        self.stack.is_empty()
    }

    /// Number of data values open above the virtual root.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The header at stack level `i`, where level 0 is the virtual root and
    /// level [`State::depth`] is the current value.
    pub fn index(&self, i: usize) -> Header {
        if i == self.stack.len() {
            self.curr.header
        } else {
            self.stack[i].header
        }
    }

    /// Opens the value of `h`. The effective length is the header length
    /// restricted by the parent's remaining space.
    pub fn push(&mut self, h: Header) {
        let remaining = self.curr.remaining();
        self.stack.push(self.curr);
        self.curr = StateEntry {
            header: h,
            offset: 0,
            length: h.length.min(remaining),
        };
    }

    /// Closes the current value, folding its progress into the new top.
    pub fn pop(&mut self) {
        let prev = self.curr;
        self.curr = self.stack.pop().unwrap_or(ROOT);
        self.curr.offset += prev.offset;
    }
}
