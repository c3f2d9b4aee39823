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

//! Shape descriptors and the classifiers that produce them.

use crate::arena::ReaderArena;
use crate::pointer::{struct_data_size, struct_ptr_count, ElementSize, Pointer, PointerKind};
use crate::private::endian;
use crate::Result;

/// Word counts of a struct's data and pointer sections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StructShape {
    pub data: u16,
    pub pointers: u16,
}

impl StructShape {
    /// Decodes the upper 32 bits of a struct pointer or of an inline-composite tag word.
    #[inline]
    fn from_hi(hi: u32) -> Self {
        Self {
            data: struct_data_size(hi),
            pointers: struct_ptr_count(hi),
        }
    }
}

/// Layout of a single list element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementShape {
    Void,
    Bit,
    Byte,
    TwoBytes,
    FourBytes,
    EightBytes,
    Pointer,
    /// Each element is a struct of the given shape.
    InlineComposite(StructShape),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListShape {
    pub size: ElementShape,
}

/// Capabilities carry no shape beyond being capabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CapShape;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Struct(StructShape),
    List(ListShape),
    Capability(CapShape),
}

impl Shape {
    pub fn pointer_kind(&self) -> PointerKind {
        match self {
            Self::Struct(_) => PointerKind::Struct,
            Self::List(_) => PointerKind::List,
            Self::Capability(_) => PointerKind::Capability,
        }
    }
}

impl From<StructShape> for Shape {
    fn from(shape: StructShape) -> Self {
        Self::Struct(shape)
    }
}

impl From<ListShape> for Shape {
    fn from(shape: ListShape) -> Self {
        Self::List(shape)
    }
}

impl From<CapShape> for Shape {
    fn from(shape: CapShape) -> Self {
        Self::Capability(shape)
    }
}

/// Maps every selector but `InlineComposite`, whose payload has to come from elsewhere.
fn element_shape(size: ElementSize) -> Option<ElementShape> {
    Some(match size {
        ElementSize::Void => ElementShape::Void,
        ElementSize::Bit => ElementShape::Bit,
        ElementSize::Byte => ElementShape::Byte,
        ElementSize::TwoBytes => ElementShape::TwoBytes,
        ElementSize::FourBytes => ElementShape::FourBytes,
        ElementSize::EightBytes => ElementShape::EightBytes,
        ElementSize::Pointer => ElementShape::Pointer,
        ElementSize::InlineComposite => return None,
    })
}

/// Decodes the shape of `p` from its bits alone. Never fails and validates nothing.
///
/// For an inline-composite list this reads the tag word at the list's target, so the eight
/// bytes at `p.object.position` must lie inside `p.object.segment.raw`; if they do not, this
/// panics. Pointers resolved by [`crate::arena::ReaderArenaImpl`] always satisfy this, so only
/// hand-built pointers can trip it.
pub fn any_shape(p: &Pointer<'_>) -> Shape {
    match p.kind {
        PointerKind::Struct => Shape::Struct(StructShape::from_hi(p.hi)),
        PointerKind::List => {
            let size = p.list_element_size();
            let size = element_shape(size).unwrap_or_else(|| {
                let tag_hi = endian::read_u32(p.object.segment.raw, p.object.position + 4);
                ElementShape::InlineComposite(StructShape::from_hi(tag_hi))
            });
            Shape::List(ListShape { size })
        }
        PointerKind::Capability => Shape::Capability(CapShape),
    }
}

/// Decodes the shape of a struct pointer after `arena` has validated it.
pub fn struct_shape<A>(arena: &A, p: &Pointer<'_>) -> Result<StructShape>
where
    A: ReaderArena + ?Sized,
{
    // A non-struct pointer here is bad data rather than a programming error, and catching bad
    // data is the validator's job.
    let layout = arena.generic_struct_layout(p)?;
    Ok(StructShape {
        data: (layout.bytes.data >> 3) as u16,
        pointers: (layout.bytes.pointers >> 3) as u16,
    })
}

/// Decodes the shape of a list pointer after `arena` has validated it.
pub fn list_shape<A>(arena: &A, p: &Pointer<'_>) -> Result<ListShape>
where
    A: ReaderArena + ?Sized,
{
    let size = p.list_element_size();
    if size == ElementSize::Bit {
        arena.bool_list_layout(p)?;
        return Ok(ListShape {
            size: ElementShape::Bit,
        });
    }

    let layout = arena.generic_nonbool_list_layout(p)?;
    let size = element_shape(size).unwrap_or(ElementShape::InlineComposite(StructShape {
        data: (layout.encoding.bytes.data >> 3) as u16,
        pointers: (layout.encoding.bytes.pointers >> 3) as u16,
    }));
    Ok(ListShape { size })
}

/// Confirms that `p` is a capability pointer.
pub fn cap_shape<A>(arena: &A, p: &Pointer<'_>) -> Result<CapShape>
where
    A: ReaderArena + ?Sized,
{
    arena.cap_layout(p)?;
    Ok(CapShape)
}
