//! Record catalogue
//!
//! Records are kept in a slot table and chained into a singly linked list,
//! newest first. Links are slot indices; vacated slots are recycled.

use crate::pool::BlockHandle;
use std::fmt;

/// Index of a record slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(u32);

impl RecordId {
    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record#{}", self.0)
    }
}

/// One key/value entry; the value bytes live in `block`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: u16,
    pub length: u16,
    pub block: BlockHandle,
    next: Option<RecordId>,
}

impl Record {
    pub fn new(key: u16, length: u16, block: BlockHandle) -> Self {
        Self {
            key,
            length,
            block,
            next: None,
        }
    }

    pub fn len(&self) -> usize {
        usize::from(self.length)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Catalogue {
    slots: Vec<Option<Record>>,
    vacant: Vec<RecordId>,
    head: Option<RecordId>,
    len: usize,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.slots.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.slots.get_mut(id.slot()).and_then(Option::as_mut)
    }

    /// Walk from the head, yielding each record with its id
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            catalogue: self,
            cursor: self.head,
        }
    }

    /// First record (from the head) carrying `key`
    pub fn find(&self, key: u16) -> Option<RecordId> {
        self.iter()
            .find(|(_, record)| record.key == key)
            .map(|(id, _)| id)
    }

    /// Like [`find`](Self::find), also returning the record linking to it
    pub fn find_with_prev(&self, key: u16) -> Option<(Option<RecordId>, RecordId)> {
        let mut prev = None;
        for (id, record) in self.iter() {
            if record.key == key {
                return Some((prev, id));
            }
            prev = Some(id);
        }
        None
    }

    /// Link a record in at the head
    pub fn push_front(&mut self, mut record: Record) -> RecordId {
        record.next = self.head;

        let id = match self.vacant.pop() {
            Some(id) => {
                self.slots[id.slot()] = Some(record);
                id
            }
            None => {
                self.slots.push(Some(record));
                RecordId((self.slots.len() - 1) as u32)
            }
        };

        self.head = Some(id);
        self.len += 1;
        id
    }

    /// Unlink `id`, whose predecessor in the chain is `prev`
    pub fn unlink(&mut self, prev: Option<RecordId>, id: RecordId) -> Option<Record> {
        let record = self.slots.get_mut(id.slot())?.take()?;

        match prev {
            None => self.head = record.next,
            Some(prev) => {
                if let Some(prev) = self.get_mut(prev) {
                    prev.next = record.next;
                }
            }
        }

        self.vacant.push(id);
        self.len -= 1;
        Some(record)
    }
}

pub(crate) struct Iter<'a> {
    catalogue: &'a Catalogue,
    cursor: Option<RecordId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (RecordId, &'a Record);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let record = self.catalogue.get(id)?;
        self.cursor = record.next;
        Some((id, record))
    }
}
