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

pub type BitCount32 = u32;
pub type BitCount64 = u64;

pub type WordCount16 = u16;
pub type WordCount32 = u32;

pub type ElementCount32 = u32;

pub type WirePointerCount16 = u16;
pub type WirePointerCount32 = u32;

pub const BITS_PER_BYTE: usize = 8;
pub const BITS_PER_WORD: usize = 64;
pub const BYTES_PER_WORD: usize = 8;

pub const BITS_PER_POINTER: usize = 64;
pub const BYTES_PER_POINTER: usize = 8;
pub const WORDS_PER_POINTER: usize = 1;

pub const POINTER_SIZE_IN_WORDS: usize = 1;

/// Rounds a bit count up to whole words.
#[inline]
pub fn round_bits_up_to_words(bits: BitCount64) -> u64 {
    //# This code assumes 64-bit words.
    (bits + 63) / (BITS_PER_WORD as u64)
}

/// Number of bytes spanned by `words` words.
#[inline]
pub fn words_to_bytes(words: u64) -> u64 {
    words * BYTES_PER_WORD as u64
}
