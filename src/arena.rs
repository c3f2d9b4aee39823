// Copyright (c) 2013-2015 Sandstorm Development Group, Inc. and contributors
// Licensed under the MIT License:
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Layout validation of resolved pointers against the segments of a message.
//!
//! [`ReaderArena`] is the seam the validated classifiers in [`crate::shape`] call through.
//! [`ReaderArenaImpl`] is the implementation over a set of [`ReaderSegments`]; it also
//! resolves raw pointer words, following far pointers, into [`Pointer`]s.

use tracing::{debug, trace};

use crate::message::{ReaderOptions, ReaderSegments};
use crate::pointer::{
    data_bits_per_element, pointers_per_element, struct_data_size, struct_ptr_count, ElementSize,
    Object, Pointer, PointerKind, Segment, SegmentId, WirePointer, WirePointerKind,
};
use crate::private::read_limiter::ReadLimiter;
use crate::private::units::*;
use crate::{Error, ErrorKind, Result};

/// Sizes of a struct's sections, in bytes. Always multiples of eight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteSize {
    pub data: u32,
    pub pointers: u32,
}

impl ByteSize {
    fn from_words(data: WordCount16, pointers: WirePointerCount16) -> Self {
        Self {
            data: u32::from(data) * BYTES_PER_WORD as u32,
            pointers: u32::from(pointers) * BYTES_PER_POINTER as u32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructLayout<'a> {
    pub segment: Segment<'a>,
    /// Byte position of the data section.
    pub data: usize,
    /// Byte position of the pointer section.
    pub pointers: usize,
    pub bytes: ByteSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoolListLayout<'a> {
    pub segment: Segment<'a>,
    pub begin: usize,
    pub length: ElementCount32,
}

/// How each element of a non-bit list is laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListEncoding {
    pub flag: ElementSize,
    pub bytes: ByteSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NonboolListLayout<'a> {
    pub segment: Segment<'a>,
    /// Byte position of the first element. Past the tag word for inline-composite lists.
    pub begin: usize,
    pub length: ElementCount32,
    pub encoding: ListEncoding,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapLayout {
    pub index: u32,
}

/// Validates the layout a resolved pointer describes.
///
/// Every method fails with a pointer-type error ([`Error::is_pointer_type_error`]) when the
/// pointer is not of the kind the method validates, and with a structural error when the
/// pointer is of the right kind but its target is unsound.
pub trait ReaderArena {
    fn generic_struct_layout<'a>(&self, p: &Pointer<'a>) -> Result<StructLayout<'a>>;

    /// Validates a list of bits. Lists with any other element size are rejected.
    fn bool_list_layout<'a>(&self, p: &Pointer<'a>) -> Result<BoolListLayout<'a>>;

    /// Validates a list of any element size but bits, inline-composite lists included.
    fn generic_nonbool_list_layout<'a>(&self, p: &Pointer<'a>) -> Result<NonboolListLayout<'a>>;

    fn cap_layout(&self, p: &Pointer<'_>) -> Result<CapLayout>;
}

impl<A> ReaderArena for &A
where
    A: ReaderArena + ?Sized,
{
    fn generic_struct_layout<'a>(&self, p: &Pointer<'a>) -> Result<StructLayout<'a>> {
        (**self).generic_struct_layout(p)
    }

    fn bool_list_layout<'a>(&self, p: &Pointer<'a>) -> Result<BoolListLayout<'a>> {
        (**self).bool_list_layout(p)
    }

    fn generic_nonbool_list_layout<'a>(&self, p: &Pointer<'a>) -> Result<NonboolListLayout<'a>> {
        (**self).generic_nonbool_list_layout(p)
    }

    fn cap_layout(&self, p: &Pointer<'_>) -> Result<CapLayout> {
        (**self).cap_layout(p)
    }
}

fn unexpected(kind: ErrorKind, found: &Pointer<'_>) -> Error {
    trace!(?kind, found = ?found.kind, hi = found.hi, "rejected pointer");
    Error::from_kind(kind)
}

fn out_of_bounds() -> Error {
    Error::from_kind(ErrorKind::MessageContainsOutOfBoundsPointer)
}

pub struct ReaderArenaImpl<S> {
    segments: S,
    read_limiter: ReadLimiter,
}

#[cfg(feature = "sync_reader")]
fn _assert_sync() {
    fn _assert_sync<T: Sync>() {}
    fn _assert_reader<S: ReaderSegments + Sync>() {
        _assert_sync::<ReaderArenaImpl<S>>();
    }
}

impl<S> ReaderArenaImpl<S>
where
    S: ReaderSegments,
{
    pub fn new(segments: S, options: ReaderOptions) -> Self {
        Self {
            segments,
            read_limiter: ReadLimiter::new(options.traversal_limit_in_words),
        }
    }

    pub fn into_segments(self) -> S {
        self.segments
    }

    /// Returns the segment with id `id`, trimmed to whole words.
    pub fn get_segment(&self, id: SegmentId) -> Result<Segment<'_>> {
        match self.segments.get_segment(id) {
            Some(raw) => {
                let len = raw.len() - raw.len() % BYTES_PER_WORD;
                Ok(Segment {
                    id,
                    raw: &raw[..len],
                })
            }
            None => Err(Error::from_kind(ErrorKind::InvalidSegmentId(id))),
        }
    }

    /// Resolves the root pointer, the first word of the first segment.
    pub fn root_pointer(&self) -> Result<Pointer<'_>> {
        self.pointer_at(0, 0)
    }

    /// Resolves the pointer stored in word `word_index` of segment `segment_id`, following
    /// far pointers to the segment holding the target.
    pub fn pointer_at(
        &self,
        segment_id: SegmentId,
        word_index: WordCount32,
    ) -> Result<Pointer<'_>> {
        let segment = self.get_segment(segment_id)?;
        let reff = read_word(segment, word_index)?;
        match reff.kind() {
            WirePointerKind::Far => self.follow_fars(&reff),
            _ => positional(segment, word_index, &reff),
        }
    }

    fn follow_fars(&self, reff: &WirePointer) -> Result<Pointer<'_>> {
        let pad_segment = self.get_segment(reff.far_segment_id())?;
        let pad_index = reff.far_position_in_segment();
        debug!(
            segment = pad_segment.id,
            position = pad_index,
            double = reff.is_double_far(),
            "following far pointer"
        );

        if !reff.is_double_far() {
            let pad = read_word(pad_segment, pad_index)?;
            if pad.kind() == WirePointerKind::Far {
                return Err(Error::failed(
                    "Far pointer landing pad is itself a far pointer.".to_string(),
                ));
            }
            return positional(pad_segment, pad_index, &pad);
        }

        //# Landing pad is another far pointer. It is followed by a
        //# tag describing the pointed-to object.
        let pad = read_word(pad_segment, pad_index)?;
        let tag = read_word(pad_segment, pad_index.checked_add(1).ok_or_else(out_of_bounds)?)?;
        if pad.kind() != WirePointerKind::Far {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsFarPointerWhereLandingPadWasExpected,
            ));
        }
        if pad.is_double_far() {
            return Err(Error::from_kind(ErrorKind::MalformedDoubleFarPointer));
        }

        let content = self.get_segment(pad.far_segment_id())?;
        let position = word_position(content, pad.far_position_in_segment())?;
        let kind = match tag.kind() {
            WirePointerKind::Struct => PointerKind::Struct,
            WirePointerKind::List => PointerKind::List,
            WirePointerKind::Other if tag.is_capability() => PointerKind::Capability,
            WirePointerKind::Other => {
                return Err(Error::from_kind(
                    ErrorKind::MessageContainsInvalidCapabilityPointer,
                ))
            }
            WirePointerKind::Far => {
                return Err(Error::from_kind(ErrorKind::MalformedDoubleFarPointer))
            }
        };
        with_tag_word(Pointer {
            kind,
            hi: tag.upper32bits,
            object: Object {
                segment: content,
                position,
            },
        })
    }

    /// Checks that `size_in_words` words starting at byte `start` lie inside the
    /// segment, and charges them against the read limit.
    fn contains_interval(&self, id: SegmentId, start: usize, size_in_words: u64) -> Result<()> {
        let segment = self.get_segment(id)?;
        let end = (start as u64).checked_add(words_to_bytes(size_in_words));
        match end {
            Some(end) if end <= segment.raw.len() as u64 => {
                self.read_limiter.can_read(size_in_words as usize)
            }
            _ => Err(out_of_bounds()),
        }
    }

    fn amplified_read(&self, virtual_amount: u64) -> Result<()> {
        self.read_limiter.can_read(virtual_amount as usize)
    }
}

fn read_word(segment: Segment<'_>, word_index: WordCount32) -> Result<WirePointer> {
    let position = (word_index as usize)
        .checked_mul(BYTES_PER_WORD)
        .ok_or_else(out_of_bounds)?;
    WirePointer::read(segment.raw, position).ok_or_else(out_of_bounds)
}

/// Byte position of word `word_index`, which may be one past the end of the segment.
fn word_position(segment: Segment<'_>, word_index: WordCount32) -> Result<usize> {
    let position = word_index as usize * BYTES_PER_WORD;
    if position > segment.raw.len() {
        Err(out_of_bounds())
    } else {
        Ok(position)
    }
}

/// Resolves a struct, list or capability pointer stored at `word_index`.
fn positional<'a>(
    segment: Segment<'a>,
    word_index: WordCount32,
    reff: &WirePointer,
) -> Result<Pointer<'a>> {
    let kind = match reff.kind() {
        WirePointerKind::Struct => PointerKind::Struct,
        WirePointerKind::List => PointerKind::List,
        WirePointerKind::Other => {
            if !reff.is_capability() {
                return Err(Error::from_kind(
                    ErrorKind::MessageContainsInvalidCapabilityPointer,
                ));
            }
            return Ok(Pointer {
                kind: PointerKind::Capability,
                hi: reff.upper32bits,
                object: Object {
                    segment,
                    position: word_index as usize * BYTES_PER_WORD,
                },
            });
        }
        WirePointerKind::Far => {
            return Err(Error::failed("Unexpected far pointer.".to_string()));
        }
    };

    let target = i64::from(word_index)
        + POINTER_SIZE_IN_WORDS as i64
        + i64::from(reff.target_offset_in_words());
    let target = WordCount32::try_from(target).map_err(|_| out_of_bounds())?;
    with_tag_word(Pointer {
        kind,
        hi: reff.upper32bits,
        object: Object {
            segment,
            position: word_position(segment, target)?,
        },
    })
}

/// Rejects an inline-composite list whose target has no room for the tag word.
fn with_tag_word(p: Pointer<'_>) -> Result<Pointer<'_>> {
    if p.kind == PointerKind::List
        && p.list_element_size() == ElementSize::InlineComposite
        && WirePointer::read(p.object.segment.raw, p.object.position).is_none()
    {
        return Err(out_of_bounds());
    }
    Ok(p)
}

impl<S> ReaderArena for ReaderArenaImpl<S>
where
    S: ReaderSegments,
{
    fn generic_struct_layout<'a>(&self, p: &Pointer<'a>) -> Result<StructLayout<'a>> {
        if p.kind != PointerKind::Struct {
            return Err(unexpected(
                ErrorKind::MessageContainsNonStructPointerWhereStructPointerWasExpected,
                p,
            ));
        }

        let data_size = struct_data_size(p.hi);
        let ptr_count = struct_ptr_count(p.hi);
        let bytes = ByteSize::from_words(data_size, ptr_count);
        self.contains_interval(
            p.object.segment.id,
            p.object.position,
            u64::from(data_size) + u64::from(ptr_count) * WORDS_PER_POINTER as u64,
        )?;

        Ok(StructLayout {
            segment: p.object.segment,
            data: p.object.position,
            pointers: p.object.position + bytes.data as usize,
            bytes,
        })
    }

    fn bool_list_layout<'a>(&self, p: &Pointer<'a>) -> Result<BoolListLayout<'a>> {
        if p.kind != PointerKind::List {
            return Err(unexpected(
                ErrorKind::MessageContainsNonListPointerWhereListPointerWasExpected,
                p,
            ));
        }
        if p.list_element_size() != ElementSize::Bit {
            return Err(unexpected(
                ErrorKind::FoundNonBitListWhereBitListWasExpected,
                p,
            ));
        }

        let length = p.list_element_count();
        self.contains_interval(
            p.object.segment.id,
            p.object.position,
            round_bits_up_to_words(u64::from(length)),
        )?;

        Ok(BoolListLayout {
            segment: p.object.segment,
            begin: p.object.position,
            length,
        })
    }

    fn generic_nonbool_list_layout<'a>(&self, p: &Pointer<'a>) -> Result<NonboolListLayout<'a>> {
        if p.kind != PointerKind::List {
            return Err(unexpected(
                ErrorKind::MessageContainsNonListPointerWhereListPointerWasExpected,
                p,
            ));
        }

        let segment = p.object.segment;
        match p.list_element_size() {
            ElementSize::Bit => Err(unexpected(
                ErrorKind::FoundBitListWhereNonBitListWasExpected,
                p,
            )),
            ElementSize::InlineComposite => {
                let word_count = p.list_element_count();
                self.contains_interval(
                    segment.id,
                    p.object.position,
                    u64::from(word_count) + POINTER_SIZE_IN_WORDS as u64,
                )?;

                let tag = WirePointer::read(segment.raw, p.object.position)
                    .ok_or_else(out_of_bounds)?;
                if tag.kind() != WirePointerKind::Struct {
                    return Err(Error::from_kind(
                        ErrorKind::InlineCompositeListsOfNonStructTypeAreNotSupported,
                    ));
                }

                let length = tag.inline_composite_list_element_count();
                let words_per_element = tag.struct_word_size();
                if u64::from(length) * u64::from(words_per_element) > u64::from(word_count) {
                    return Err(Error::from_kind(
                        ErrorKind::InlineCompositeListsElementsOverrunItsWordCount,
                    ));
                }

                if words_per_element == 0 {
                    // Watch out for lists of zero-sized structs, which can claim to be
                    // arbitrarily large without having sent actual data.
                    self.amplified_read(u64::from(length))?;
                }

                Ok(NonboolListLayout {
                    segment,
                    begin: p.object.position + BYTES_PER_WORD,
                    length,
                    encoding: ListEncoding {
                        flag: ElementSize::InlineComposite,
                        bytes: ByteSize::from_words(tag.struct_data_size(), tag.struct_ptr_count()),
                    },
                })
            }
            element_size => {
                let data_bits = data_bits_per_element(element_size);
                let pointer_count = pointers_per_element(element_size);
                let step =
                    u64::from(data_bits) + u64::from(pointer_count) * BITS_PER_POINTER as u64;
                let length = p.list_element_count();

                self.contains_interval(
                    segment.id,
                    p.object.position,
                    round_bits_up_to_words(u64::from(length) * step),
                )?;

                if element_size == ElementSize::Void {
                    // Watch out for lists of void, which can claim to be arbitrarily large
                    // without having sent actual data.
                    self.amplified_read(u64::from(length))?;
                }

                Ok(NonboolListLayout {
                    segment,
                    begin: p.object.position,
                    length,
                    encoding: ListEncoding {
                        flag: element_size,
                        bytes: ByteSize {
                            data: data_bits / BITS_PER_BYTE as u32,
                            pointers: pointer_count * BYTES_PER_POINTER as u32,
                        },
                    },
                })
            }
        }
    }

    fn cap_layout(&self, p: &Pointer<'_>) -> Result<CapLayout> {
        if p.kind != PointerKind::Capability {
            return Err(unexpected(
                ErrorKind::MessageContainsNonCapabilityPointerWhereCapabilityPointerWasExpected,
                p,
            ));
        }
        Ok(CapLayout { index: p.hi })
    }
}
