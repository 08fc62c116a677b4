//! Segmented memory of the machine.
//!
//! Every segment is a fixed-size array of zero-initialized words identified by a [Handle]. Handles
//! index an arena of slots; a slot is either live or vacant. Handles of unmapped segments are kept
//! on a stack and handed out again most-recently-freed first, so the handle space never grows
//! past the peak number of live segments.

use std::fmt;

use crate::error::ImageError;

/// Identifier of a segment. Handle `0` always holds the running program.
pub type Handle = u32;

/// The handle reserved for the program being executed.
pub const PROGRAM: Handle = 0;

const WORD_BYTES: usize = 4;

/// Errors returned by [Segments] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    /// The handle is vacant or was never issued.
    InvalidHandle(Handle),

    /// The handle was unmapped a second time.
    DoubleUnmap(Handle),

    /// Segment 0 can only be replaced, never unmapped.
    ProtectedSegment,

    /// A word index at or past the end of a segment.
    OutOfBounds {
        handle: Handle,
        index: u32,
        size: usize,
    },

    /// The host could not provide the words of a new segment.
    OutOfMemory {
        size: usize,
    },
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SegmentError::InvalidHandle(h) => write!(f, "invalid segment handle {}", h),
            SegmentError::DoubleUnmap(h) => write!(f, "segment {} unmapped twice", h),
            SegmentError::ProtectedSegment => write!(f, "segment 0 is protected"),
            SegmentError::OutOfBounds { handle, index, size } => {
                write!(f, "index {} outside segment {} ({} words)", index, handle, size)
            }
            SegmentError::OutOfMemory { size } => {
                write!(f, "could not allocate a segment of {} words", size)
            }
        }
    }
}

impl std::error::Error for SegmentError {}

/// Owner of every segment of a machine.
#[derive(Debug, Clone)]
pub struct Segments {
    mapped: Vec<Option<Box<[u32]>>>,
    free_handles: Vec<Handle>,
    next_handle: Handle,
}

impl Segments {
    /// Builds the memory from a program image.
    ///
    /// Every four bytes of `image` form one big-endian word of segment 0.
    ///
    /// # Errors
    /// [ImageError::MalformedImage] if the length of `image` is not a multiple of four.
    pub fn new(image: &[u8]) -> Result<Segments, ImageError> {
        Ok(Segments::from_words(image_words(image)?))
    }

    /// Builds the memory with `program` as segment 0.
    pub fn from_words(program: Vec<u32>) -> Segments {
        Segments {
            mapped: vec![Some(program.into_boxed_slice())],
            free_handles: Vec::new(),
            next_handle: 1,
        }
    }

    /// Maps a new zero-filled segment of `size` words and returns its handle.
    ///
    /// The most recently unmapped handle is reused if there is one.
    ///
    /// # Errors
    /// [SegmentError::OutOfMemory] if the words cannot be allocated. No handle is consumed then.
    pub fn allocate(&mut self, size: u32) -> Result<Handle, SegmentError> {
        let mut words = reserve(size as usize)?;
        words.resize(size as usize, 0);

        let segment = Some(words.into_boxed_slice());

        Ok(match self.free_handles.pop() {
            Some(handle) => {
                self.mapped[handle as usize] = segment;
                handle
            }
            None => {
                let handle = self.next_handle;
                self.next_handle += 1;
                self.mapped.push(segment);
                handle
            }
        })
    }

    /// Unmaps the segment at `handle`, releasing its words and making the handle reusable.
    pub fn deallocate(&mut self, handle: Handle) -> Result<(), SegmentError> {
        if handle == PROGRAM {
            return Err(SegmentError::ProtectedSegment);
        }

        let slot = self
            .mapped
            .get_mut(handle as usize)
            .ok_or(SegmentError::InvalidHandle(handle))?;

        if slot.take().is_none() {
            return Err(SegmentError::DoubleUnmap(handle));
        }

        self.free_handles.push(handle);

        Ok(())
    }

    /// Replaces the segment at `target` with an independent copy of the segment at `source`.
    ///
    /// The old words of `target` are released; `target` keeps its handle and is not pushed onto
    /// the free stack, even when it is segment 0.
    pub fn duplicate_into(&mut self, source: Handle, target: Handle) -> Result<(), SegmentError> {
        let words = self.get(source)?;
        let mut copy = reserve(words.len())?;
        copy.extend_from_slice(words);
        let copy = copy.into_boxed_slice();

        let slot = self
            .mapped
            .get_mut(target as usize)
            .and_then(Option::as_mut)
            .ok_or(SegmentError::InvalidHandle(target))?;

        *slot = copy;

        Ok(())
    }

    /// Words of the segment at `handle`.
    pub fn get(&self, handle: Handle) -> Result<&[u32], SegmentError> {
        self.mapped
            .get(handle as usize)
            .and_then(Option::as_deref)
            .ok_or(SegmentError::InvalidHandle(handle))
    }

    /// Mutable words of the segment at `handle`. Index checks are left to the caller.
    pub fn access(&mut self, handle: Handle) -> Result<&mut [u32], SegmentError> {
        self.mapped
            .get_mut(handle as usize)
            .and_then(Option::as_deref_mut)
            .ok_or(SegmentError::InvalidHandle(handle))
    }

    /// Returns `true` if `handle` currently names a live segment.
    pub fn is_mapped(&self, handle: Handle) -> bool {
        self.get(handle).is_ok()
    }

    /// Number of live segments, segment 0 included.
    pub fn live(&self) -> usize {
        self.mapped.iter().filter(|slot| slot.is_some()).count()
    }

    /// The words of the running program.
    pub fn program(&self) -> &[u32] {
        self.get(PROGRAM).unwrap_or(&[])
    }
}

/// An empty word buffer able to hold `size` words, or an error instead of aborting.
fn reserve(size: usize) -> Result<Vec<u32>, SegmentError> {
    let mut words = Vec::new();

    words
        .try_reserve_exact(size)
        .map_err(|_| SegmentError::OutOfMemory { size })?;

    Ok(words)
}

/// Splits a program image into big-endian words.
pub fn image_words(image: &[u8]) -> Result<Vec<u32>, ImageError> {
    if image.len() % WORD_BYTES != 0 {
        return Err(ImageError::MalformedImage { length: image.len() });
    }

    Ok(image
        .chunks_exact(WORD_BYTES)
        .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Segments {
        Segments::from_words(vec![0x7000_0000])
    }

    #[test]
    fn test_image_is_big_endian() {
        let segments = Segments::new(&[0xD2, 0x00, 0x00, 0x48, 0x70, 0, 0, 0]).unwrap();

        assert_eq!(segments.program(), &[0xD200_0048, 0x7000_0000]);
        assert_eq!(segments.live(), 1);
    }

    #[test]
    fn test_image_must_be_whole_words() {
        assert_eq!(
            Segments::new(&[1, 2, 3, 4, 5]).unwrap_err(),
            ImageError::MalformedImage { length: 5 },
        );
        assert!(Segments::new(&[]).is_ok());
    }

    #[test]
    fn test_allocate_is_zeroed() {
        let mut segments = empty();
        let handle = segments.allocate(10).unwrap();

        assert_eq!(handle, 1);
        assert_eq!(segments.get(handle).unwrap(), &[0; 10][..]);
    }

    #[test]
    fn test_allocate_out_of_memory() {
        let mut segments = empty();

        assert_eq!(
            segments.allocate(u32::MAX),
            Err(SegmentError::OutOfMemory { size: u32::MAX as usize }),
        );

        // The failed request did not use up a handle.
        assert_eq!(segments.allocate(1).unwrap(), 1);
        assert_eq!(segments.live(), 2);
    }

    #[test]
    fn test_reuse_last_freed_handle() {
        let mut segments = empty();

        let a = segments.allocate(4).unwrap();
        segments.deallocate(a).unwrap();
        assert_eq!(segments.allocate(8).unwrap(), a);

        let b = segments.allocate(4).unwrap();
        segments.deallocate(a).unwrap();
        segments.deallocate(b).unwrap();

        assert_eq!(segments.allocate(1).unwrap(), b);
        assert_eq!(segments.allocate(1).unwrap(), a);
        assert_eq!(segments.allocate(1).unwrap(), 3);
    }

    #[test]
    fn test_unmapped_handle_is_invalid() {
        let mut segments = empty();
        let handle = segments.allocate(2).unwrap();

        segments.access(handle).unwrap()[1] = 5;
        segments.deallocate(handle).unwrap();

        assert_eq!(segments.access(handle).unwrap_err(), SegmentError::InvalidHandle(handle));
        assert_eq!(segments.get(7).unwrap_err(), SegmentError::InvalidHandle(7));
    }

    #[test]
    fn test_deallocate_errors() {
        let mut segments = empty();
        let handle = segments.allocate(2).unwrap();

        assert_eq!(segments.deallocate(PROGRAM), Err(SegmentError::ProtectedSegment));
        assert_eq!(segments.deallocate(42), Err(SegmentError::InvalidHandle(42)));

        segments.deallocate(handle).unwrap();
        assert_eq!(segments.deallocate(handle), Err(SegmentError::DoubleUnmap(handle)));
    }

    #[test]
    fn test_duplicate_into_program() {
        let mut segments = empty();
        let handle = segments.allocate(3).unwrap();
        segments.access(handle).unwrap().copy_from_slice(&[1, 2, 3]);

        segments.duplicate_into(handle, PROGRAM).unwrap();
        assert_eq!(segments.program(), &[1, 2, 3]);

        // The copy does not alias the source.
        segments.access(handle).unwrap()[0] = 9;
        assert_eq!(segments.program(), &[1, 2, 3]);

        // Segment 0 must not become reusable.
        assert_eq!(segments.allocate(1).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_into_requires_live_handles() {
        let mut segments = empty();
        let handle = segments.allocate(3).unwrap();

        assert_eq!(segments.duplicate_into(5, PROGRAM), Err(SegmentError::InvalidHandle(5)));
        assert_eq!(segments.duplicate_into(PROGRAM, 5), Err(SegmentError::InvalidHandle(5)));

        segments.deallocate(handle).unwrap();
        assert_eq!(
            segments.duplicate_into(PROGRAM, handle),
            Err(SegmentError::InvalidHandle(handle)),
        );
        assert_eq!(segments.program(), &[0x7000_0000]);
    }
}
