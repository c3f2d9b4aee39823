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

//! Resolved pointers and the bit layout of wire pointer words.

use crate::private::endian;
use crate::private::units::*;

pub type SegmentId = u32;

pub use self::ElementSize::{
    Bit, Byte, EightBytes, FourBytes, InlineComposite, Pointer as PointerElement, TwoBytes, Void,
};

/// The 3-bit element-size selector stored in the low bits of a list pointer's upper word.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    /// Decodes the selector from the low three bits of `hi`. Every bit pattern is valid.
    #[inline]
    pub fn from_selector(hi: u32) -> Self {
        match hi & 7 {
            0 => Self::Void,
            1 => Self::Bit,
            2 => Self::Byte,
            3 => Self::TwoBytes,
            4 => Self::FourBytes,
            5 => Self::EightBytes,
            6 => Self::Pointer,
            _ => Self::InlineComposite,
        }
    }
}

pub fn data_bits_per_element(size: ElementSize) -> BitCount32 {
    match size {
        Void => 0,
        Bit => 1,
        Byte => 8,
        TwoBytes => 16,
        FourBytes => 32,
        EightBytes => 64,
        PointerElement => 0,
        InlineComposite => 0,
    }
}

pub fn pointers_per_element(size: ElementSize) -> WirePointerCount32 {
    match size {
        PointerElement => 1,
        _ => 0,
    }
}

/// The kind of a pointer that has already had any far pointers resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Struct,
    List,
    Capability,
}

/// The two-bit tag in the low bits of every wire pointer.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WirePointerKind {
    Struct = 0,
    List = 1,
    Far = 2,
    Other = 3,
}

impl WirePointerKind {
    #[inline]
    pub fn from_lo(lo: u32) -> Self {
        match lo & 3 {
            0 => Self::Struct,
            1 => Self::List,
            2 => Self::Far,
            _ => Self::Other,
        }
    }
}

/// Decoded halves of a single 64-bit wire pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WirePointer {
    pub offset_and_kind: u32,
    pub upper32bits: u32,
}

impl WirePointer {
    /// Reads the pointer stored at `position` bytes into `raw`, or `None` if the whole word
    /// is not in `raw`.
    #[inline]
    pub fn read(raw: &[u8], position: usize) -> Option<Self> {
        Some(Self {
            offset_and_kind: endian::try_read_u32(raw, position)?,
            upper32bits: endian::try_read_u32(raw, position.checked_add(4)?)?,
        })
    }

    #[inline]
    pub fn kind(&self) -> WirePointerKind {
        WirePointerKind::from_lo(self.offset_and_kind)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.offset_and_kind == 0 && self.upper32bits == 0
    }

    #[inline]
    pub fn is_capability(&self) -> bool {
        self.offset_and_kind == WirePointerKind::Other as u32
    }

    /// Signed offset, in words, from the end of this pointer to its target.
    #[inline]
    pub fn target_offset_in_words(&self) -> i32 {
        (self.offset_and_kind as i32) >> 2
    }

    #[inline]
    pub fn far_position_in_segment(&self) -> WordCount32 {
        self.offset_and_kind >> 3
    }

    #[inline]
    pub fn is_double_far(&self) -> bool {
        ((self.offset_and_kind >> 2) & 1) != 0
    }

    #[inline]
    pub fn far_segment_id(&self) -> SegmentId {
        self.upper32bits
    }

    #[inline]
    pub fn inline_composite_list_element_count(&self) -> ElementCount32 {
        self.offset_and_kind >> 2
    }

    #[inline]
    pub fn struct_data_size(&self) -> WordCount16 {
        struct_data_size(self.upper32bits)
    }

    #[inline]
    pub fn struct_ptr_count(&self) -> WirePointerCount16 {
        struct_ptr_count(self.upper32bits)
    }

    #[inline]
    pub fn struct_word_size(&self) -> WordCount32 {
        u32::from(self.struct_data_size())
            + u32::from(self.struct_ptr_count()) * WORDS_PER_POINTER as u32
    }
}

/// Data section size, in words, of a struct pointer's upper 32 bits.
#[inline]
pub fn struct_data_size(hi: u32) -> WordCount16 {
    (hi & 0xffff) as WordCount16
}

/// Pointer section size, in words, of a struct pointer's upper 32 bits.
#[inline]
pub fn struct_ptr_count(hi: u32) -> WirePointerCount16 {
    (hi >> 16) as WirePointerCount16
}

/// A segment of a message, as seen by a resolved pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment<'a> {
    pub id: SegmentId,
    pub raw: &'a [u8],
}

/// The location of a pointer's target: a byte position inside a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Object<'a> {
    pub segment: Segment<'a>,
    pub position: usize,
}

/// A pointer whose far pointers, if any, have already been followed.
///
/// For struct and list pointers `object` is where the target begins. For an inline-composite
/// list that is the list's tag word. Capability pointers have no target; their `object`
/// is only informational.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pointer<'a> {
    pub kind: PointerKind,
    pub hi: u32,
    pub object: Object<'a>,
}

impl<'a> Pointer<'a> {
    /// Element-size selector of a list pointer. Meaningless for other kinds.
    #[inline]
    pub fn list_element_size(&self) -> ElementSize {
        ElementSize::from_selector(self.hi)
    }

    /// Element count of a list pointer, or its word count for an inline-composite list.
    #[inline]
    pub fn list_element_count(&self) -> ElementCount32 {
        self.hi >> 3
    }
}
