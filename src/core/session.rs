//! Streaming session state
//!
//! A session is a cursor over one file's bytes held fully in memory. Read
//! sessions materialize the whole (decompressed) file when opened. Write
//! sessions fill a fixed buffer sized by [`Session::reserve`] and hand it to
//! the engine on close.
//!
//! This module only tracks buffers and cursors; opening and committing go
//! through [`VfsEngine`](crate::engine::VfsEngine).

use crate::config::WriteOverflow;
use crate::error::{Result, VfsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Read,
    Write,
}

/// Session state machine: `Closed → Reading | Writing → Closed`
#[derive(Debug, Default)]
pub enum Session {
    #[default]
    Closed,
    Reading {
        hash: u64,
        buffer: Vec<u8>,
        cursor: usize,
    },
    Writing {
        hash: u64,
        /// Allocated by `reserve`, at most once
        buffer: Option<Vec<u8>>,
        cursor: usize,
    },
}

impl Session {
    pub fn reading(hash: u64, buffer: Vec<u8>) -> Self {
        Session::Reading {
            hash,
            buffer,
            cursor: 0,
        }
    }

    pub fn writing(hash: u64) -> Self {
        Session::Writing {
            hash,
            buffer: None,
            cursor: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Session::Closed)
    }

    pub fn mode(&self) -> Option<SessionMode> {
        match self {
            Session::Closed => None,
            Session::Reading { .. } => Some(SessionMode::Read),
            Session::Writing { .. } => Some(SessionMode::Write),
        }
    }

    pub fn hash(&self) -> Option<u64> {
        match self {
            Session::Closed => None,
            Session::Reading { hash, .. } | Session::Writing { hash, .. } => Some(*hash),
        }
    }

    /// Allocate the write buffer
    pub fn reserve(&mut self, expected_size: usize) -> Result<()> {
        match self {
            Session::Writing { buffer, .. } => {
                if buffer.is_some() {
                    return Err(VfsError::SessionState(
                        "Write buffer is already reserved".to_string(),
                    ));
                }
                *buffer = Some(vec![0u8; expected_size]);
                Ok(())
            }
            Session::Reading { .. } => Err(VfsError::SessionState(
                "Cannot reserve in a read session".to_string(),
            )),
            Session::Closed => Err(VfsError::SessionState("No open session".to_string())),
        }
    }

    /// Append at the cursor, returning the number of bytes copied
    ///
    /// Before `reserve` the capacity is zero.
    pub fn write(&mut self, data: &[u8], policy: WriteOverflow) -> Result<usize> {
        let (hash, buffer, cursor) = match self {
            Session::Writing {
                hash,
                buffer,
                cursor,
            } => (*hash, buffer, cursor),
            Session::Reading { .. } => {
                return Err(VfsError::SessionState(
                    "Cannot write in a read session".to_string(),
                ))
            }
            Session::Closed => {
                return Err(VfsError::SessionState("No open session".to_string()))
            }
        };

        let capacity = buffer.as_ref().map_or(0, Vec::len);
        let remaining = capacity - *cursor;
        if data.len() > remaining && policy == WriteOverflow::Reject {
            return Err(VfsError::CapacityExceeded {
                requested: data.len(),
                remaining,
            });
        }

        let take = data.len().min(remaining);
        if take < data.len() {
            tracing::warn!(
                "Session for {:#018x} dropped {} of {} bytes (capacity {})",
                hash,
                data.len() - take,
                data.len(),
                capacity
            );
        }

        if let Some(buffer) = buffer.as_mut() {
            buffer[*cursor..*cursor + take].copy_from_slice(&data[..take]);
        }
        *cursor += take;
        Ok(take)
    }

    /// Copy from the cursor into `out`; a short count means end of stream
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        match self {
            Session::Reading { buffer, cursor, .. } => {
                let take = out.len().min(buffer.len() - *cursor);
                out[..take].copy_from_slice(&buffer[*cursor..*cursor + take]);
                *cursor += take;
                Ok(take)
            }
            Session::Writing { .. } => Err(VfsError::SessionState(
                "Cannot read in a write session".to_string(),
            )),
            Session::Closed => Err(VfsError::SessionState("No open session".to_string())),
        }
    }

    /// Logical length: the file size when reading, bytes written so far when
    /// writing
    pub fn size(&self) -> Result<u64> {
        match self {
            Session::Reading { buffer, .. } => Ok(buffer.len() as u64),
            Session::Writing { cursor, .. } => Ok(*cursor as u64),
            Session::Closed => Err(VfsError::SessionState("No open session".to_string())),
        }
    }

    /// Bytes a write session would commit
    pub fn committed(&self) -> &[u8] {
        match self {
            Session::Writing {
                buffer: Some(buffer),
                cursor,
                ..
            } => &buffer[..*cursor],
            _ => &[],
        }
    }
}
