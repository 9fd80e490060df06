// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeMap;

/// Holds items that completed out of order and releases them by index.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ReorderBuffer<T> {
    pub fn new(first: u64) -> Self {
        Self {
            next: first,
            pending: BTreeMap::new(),
        }
    }

    /// Accepts `item` and returns every item that is now releasable, in order.
    pub fn push(&mut self, index: u64, item: T) -> Vec<T> {
        self.pending.insert(index, item);
        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    /// Index of the next item to be released.
    pub fn next_index(&self) -> u64 {
        self.next
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_in_index_order() {
        let mut buf = ReorderBuffer::new(4);
        assert!(buf.push(6, "c").is_empty());
        assert!(buf.push(5, "b").is_empty());
        assert_eq!(buf.pending(), 2);
        assert_eq!(buf.push(4, "a"), vec!["a", "b", "c"]);
        assert_eq!(buf.next_index(), 7);
        assert_eq!(buf.push(7, "d"), vec!["d"]);
        assert_eq!(buf.pending(), 0);
    }
}
