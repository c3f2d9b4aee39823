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

//! # capnp-shape
//!
//! Classifies the *shape* of a Cap'n Proto wire pointer: whether it refers to a struct,
//! a list or a capability, together with the size metadata needed to interpret its target.
//!
//! There are two ways in. [`shape::any_shape`] decodes whatever the bits say and never fails;
//! use it for introspection. [`shape::struct_shape`], [`shape::list_shape`] and
//! [`shape::cap_shape`] go through a [`arena::ReaderArena`], which validates the pointer
//! against the message's segments first. Use those before trusting the shape for field access.

pub mod arena;
pub mod message;
pub mod pointer;
pub mod shape;

pub(crate) mod private;

pub use crate::shape::{
    any_shape, cap_shape, list_shape, struct_shape, CapShape, ElementShape, ListShape, Shape,
    StructShape,
};

/// Because messages are lazily validated, the return type of any method that reads a pointer
/// field must be wrapped in a Result.
pub type Result<T> = ::core::result::Result<T, Error>;

/// Describes an arbitrary error that prevented a pointer from being validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// The general kind of the error. Code that decides how to respond to an error
    /// should read only this field in making its decision.
    pub kind: ErrorKind,

    /// Extra context about error
    pub extra: String,
}

/// The general nature of an error. The purpose of this enum is not to describe the error itself,
/// but rather to describe how the client might want to respond to the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Something went wrong
    Failed,

    /// Found bit list where a list of some other element size was expected.
    FoundBitListWhereNonBitListWasExpected,

    /// Found a list of some other element size where a bit list was expected.
    FoundNonBitListWhereBitListWasExpected,

    /// InlineComposite list's elements overrun its word count.
    InlineCompositeListsElementsOverrunItsWordCount,

    /// InlineComposite lists of non-STRUCT type are not supported.
    InlineCompositeListsOfNonStructTypeAreNotSupported,

    /// Invalid segment id: {0}
    InvalidSegmentId(u32),

    /// Malformed double-far pointer.
    MalformedDoubleFarPointer,

    /// Message contains double-far pointer whose landing pad is not a far pointer.
    MessageContainsFarPointerWhereLandingPadWasExpected,

    /// Message contains a capability pointer with a non-zero offset field.
    MessageContainsInvalidCapabilityPointer,

    /// Message contains non-capability pointer where capability pointer was expected.
    MessageContainsNonCapabilityPointerWhereCapabilityPointerWasExpected,

    /// Message contains non-list pointer where list pointer was expected.
    MessageContainsNonListPointerWhereListPointerWasExpected,

    /// Message contains non-struct pointer where struct pointer was expected.
    MessageContainsNonStructPointerWhereStructPointerWasExpected,

    /// Message contains out-of-bounds pointer.
    MessageContainsOutOfBoundsPointer,

    /// Read limit exceeded
    ReadLimitExceeded,
}

impl ErrorKind {
    /// Whether this kind means "the pointer is not of the kind the caller asked for",
    /// as opposed to a structurally corrupt message.
    pub fn is_pointer_type(self) -> bool {
        matches!(
            self,
            Self::MessageContainsNonStructPointerWhereStructPointerWasExpected
                | Self::MessageContainsNonListPointerWhereListPointerWasExpected
                | Self::MessageContainsNonCapabilityPointerWhereCapabilityPointerWasExpected
                | Self::FoundBitListWhereNonBitListWasExpected
                | Self::FoundNonBitListWhereBitListWasExpected
        )
    }
}

impl Error {
    /// Writes to the `extra` field. Does not change the kind.
    pub fn extend_self(&mut self, more: String) {
        self.extra.push_str(&more);
    }

    /// Constructs a new error with kind `ErrorKind::Failed`.
    pub fn failed(description: String) -> Self {
        Self {
            extra: description,
            kind: ErrorKind::Failed,
        }
    }

    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            extra: String::new(),
            kind,
        }
    }

    pub fn is_pointer_type_error(&self) -> bool {
        self.kind.is_pointer_type()
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::Failed => write!(fmt, "Failed"),
            Self::FoundBitListWhereNonBitListWasExpected => {
                write!(fmt, "Found bit list where a non-bit list was expected.")
            }
            Self::FoundNonBitListWhereBitListWasExpected => {
                write!(fmt, "Found non-bit list where a bit list was expected.")
            }
            Self::InlineCompositeListsElementsOverrunItsWordCount => {
                write!(fmt, "InlineComposite list's elements overrun its word count.")
            }
            Self::InlineCompositeListsOfNonStructTypeAreNotSupported => {
                write!(fmt, "InlineComposite lists of non-STRUCT type are not supported.")
            }
            Self::InvalidSegmentId(id) => write!(fmt, "Invalid segment id: {id}"),
            Self::MalformedDoubleFarPointer => write!(fmt, "Malformed double-far pointer."),
            Self::MessageContainsFarPointerWhereLandingPadWasExpected => write!(
                fmt,
                "Message contains double-far pointer whose landing pad is not a far pointer."
            ),
            Self::MessageContainsInvalidCapabilityPointer => {
                write!(fmt, "Message contains invalid capability pointer.")
            }
            Self::MessageContainsNonCapabilityPointerWhereCapabilityPointerWasExpected => write!(
                fmt,
                "Message contains non-capability pointer where capability pointer was expected."
            ),
            Self::MessageContainsNonListPointerWhereListPointerWasExpected => write!(
                fmt,
                "Message contains non-list pointer where list pointer was expected."
            ),
            Self::MessageContainsNonStructPointerWhereStructPointerWasExpected => write!(
                fmt,
                "Message contains non-struct pointer where struct pointer was expected."
            ),
            Self::MessageContainsOutOfBoundsPointer => {
                write!(fmt, "Message contains out-of-bounds pointer.")
            }
            Self::ReadLimitExceeded => write!(fmt, "Read limit exceeded"),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        if self.extra.is_empty() {
            write!(fmt, "{}", self.kind)
        } else {
            write!(fmt, "{}: {}", self.kind, self.extra)
        }
    }
}

impl std::error::Error for Error {}
