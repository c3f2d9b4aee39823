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

use capnp_shape::arena::{ReaderArena, ReaderArenaImpl};
use capnp_shape::message::ReaderOptions;
use capnp_shape::pointer::PointerKind;
use capnp_shape::{
    any_shape, cap_shape, list_shape, struct_shape, CapShape, ElementShape, ErrorKind, ListShape,
    Shape, StructShape,
};

fn write_u32(raw: &mut [u8], offset: usize, value: u32) {
    raw[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn segment_with_root(lo: u32, hi: u32) -> Vec<Vec<u8>> {
    let mut raw = vec![0u8; 2040];
    write_u32(&mut raw, 0, lo);
    write_u32(&mut raw, 4, hi);
    vec![raw]
}

fn arena(segments: Vec<Vec<u8>>) -> ReaderArenaImpl<Vec<Vec<u8>>> {
    ReaderArenaImpl::new(segments, ReaderOptions::new())
}

#[test]
fn struct_shape_from_root() {
    let arena = arena(segment_with_root(0x00, (0x13 << 16) | 0x2a));
    let p = arena.root_pointer().unwrap();
    let shape = struct_shape(&arena, &p).unwrap();
    assert_eq!(
        shape,
        StructShape {
            data: 0x2a,
            pointers: 0x13,
        }
    );
    assert_eq!(any_shape(&p), Shape::Struct(shape));
}

#[test]
fn struct_shape_rejects_other_kinds() {
    for lo in [0x01, 0x03] {
        let arena = arena(segment_with_root(lo, 0));
        let p = arena.root_pointer().unwrap();
        let err = struct_shape(&arena, &p).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::MessageContainsNonStructPointerWhereStructPointerWasExpected
        );
        assert!(err.is_pointer_type_error());
    }
}

#[test]
fn list_shape_for_every_selector() {
    let expected = [
        ElementShape::Void,
        ElementShape::Bit,
        ElementShape::Byte,
        ElementShape::TwoBytes,
        ElementShape::FourBytes,
        ElementShape::EightBytes,
        ElementShape::Pointer,
    ];
    for (selector, size) in expected.into_iter().enumerate() {
        let arena = arena(segment_with_root(0x01, selector as u32));
        let p = arena.root_pointer().unwrap();
        let shape = list_shape(&arena, &p).unwrap();
        assert_eq!(shape, ListShape { size });
        assert_eq!(any_shape(&p), Shape::List(shape));
    }
}

#[test]
fn list_shape_inline_composite() {
    let mut segments = segment_with_root(0x01, ((5 * (0x10 + 0x09)) << 3) | 0x07);
    write_u32(&mut segments[0], 8, 5 << 2);
    write_u32(&mut segments[0], 12, (0x10 << 16) | 0x09);
    let arena = arena(segments);
    let p = arena.root_pointer().unwrap();

    let shape = list_shape(&arena, &p).unwrap();
    assert_eq!(
        shape,
        ListShape {
            size: ElementShape::InlineComposite(StructShape {
                data: 0x09,
                pointers: 0x10,
            }),
        }
    );
    assert_eq!(any_shape(&p), Shape::List(shape));

    let layout = arena.generic_nonbool_list_layout(&p).unwrap();
    assert_eq!(layout.length, 5);
    assert_eq!(layout.begin, 16);
    assert_eq!(layout.encoding.bytes.data, 0x09 * 8);
}

#[test]
fn list_shape_rejects_other_kinds() {
    let arena_struct = arena(segment_with_root(0x00, (0x13 << 16) | 0x2a));
    let p = arena_struct.root_pointer().unwrap();
    assert_eq!(
        list_shape(&arena_struct, &p).unwrap_err().kind,
        ErrorKind::MessageContainsNonListPointerWhereListPointerWasExpected
    );

    let arena_cap = arena(segment_with_root(0x03, 0));
    let p = arena_cap.root_pointer().unwrap();
    assert!(list_shape(&arena_cap, &p)
        .unwrap_err()
        .is_pointer_type_error());
}

#[test]
fn bit_and_non_bit_validators_reject_each_other() {
    let bits = arena(segment_with_root(0x01, (10 << 3) | 1));
    let p = bits.root_pointer().unwrap();
    assert_eq!(
        bits.generic_nonbool_list_layout(&p).unwrap_err().kind,
        ErrorKind::FoundBitListWhereNonBitListWasExpected
    );
    assert_eq!(bits.bool_list_layout(&p).unwrap().length, 10);

    let bytes = arena(segment_with_root(0x01, (10 << 3) | 2));
    let p = bytes.root_pointer().unwrap();
    assert_eq!(
        bytes.bool_list_layout(&p).unwrap_err().kind,
        ErrorKind::FoundNonBitListWhereBitListWasExpected
    );
}

#[test]
fn cap_shape_from_root() {
    let arena_cap = arena(segment_with_root(0x03, 0));
    let p = arena_cap.root_pointer().unwrap();
    assert_eq!(p.kind, PointerKind::Capability);
    assert_eq!(cap_shape(&arena_cap, &p).unwrap(), CapShape);
    assert_eq!(any_shape(&p), Shape::Capability(CapShape));

    for (lo, hi) in [(0x00, (0x13 << 16) | 0x2a), (0x01, 0)] {
        let arena = arena(segment_with_root(lo, hi));
        let p = arena.root_pointer().unwrap();
        assert_eq!(
            cap_shape(&arena, &p).unwrap_err().kind,
            ErrorKind::MessageContainsNonCapabilityPointerWhereCapabilityPointerWasExpected
        );
    }
}

#[test]
fn capability_with_offset_is_invalid() {
    let arena = arena(segment_with_root((1 << 2) | 0x03, 0));
    assert_eq!(
        arena.root_pointer().unwrap_err().kind,
        ErrorKind::MessageContainsInvalidCapabilityPointer
    );
}

#[test]
fn oversized_struct_is_out_of_bounds() {
    // 255 words in the segment; the struct claims 300 starting at word 1.
    let arena = arena(segment_with_root(0x00, (100 << 16) | 200));
    let p = arena.root_pointer().unwrap();
    let err = struct_shape(&arena, &p).unwrap_err();
    assert_eq!(err.kind, ErrorKind::MessageContainsOutOfBoundsPointer);
    assert!(!err.is_pointer_type_error());

    // The unchecked path still reports what the bits say.
    assert_eq!(
        any_shape(&p),
        Shape::Struct(StructShape {
            data: 200,
            pointers: 100,
        })
    );
}

#[test]
fn pointer_target_outside_segment() {
    let arena = arena(segment_with_root(1000 << 2, 0));
    assert_eq!(
        arena.root_pointer().unwrap_err().kind,
        ErrorKind::MessageContainsOutOfBoundsPointer
    );
}

#[test]
fn inline_composite_overrun() {
    let mut segments = segment_with_root(0x01, (10 << 3) | 0x07);
    write_u32(&mut segments[0], 8, 6 << 2);
    write_u32(&mut segments[0], 12, (1 << 16) | 1);
    let arena = arena(segments);
    let p = arena.root_pointer().unwrap();
    assert_eq!(
        list_shape(&arena, &p).unwrap_err().kind,
        ErrorKind::InlineCompositeListsElementsOverrunItsWordCount
    );
}

#[test]
fn inline_composite_with_non_struct_tag() {
    let mut segments = segment_with_root(0x01, (4 << 3) | 0x07);
    write_u32(&mut segments[0], 8, (2 << 2) | 0x01);
    write_u32(&mut segments[0], 12, 2);
    let arena = arena(segments);
    let p = arena.root_pointer().unwrap();
    assert_eq!(
        list_shape(&arena, &p).unwrap_err().kind,
        ErrorKind::InlineCompositeListsOfNonStructTypeAreNotSupported
    );
}

#[test]
fn traversal_limit() {
    let mut options = ReaderOptions::new();
    options.traversal_limit_in_words(4);

    let arena = ReaderArenaImpl::new(segment_with_root(0x00, (2 << 16) | 3), options);
    let p = arena.root_pointer().unwrap();
    assert_eq!(
        struct_shape(&arena, &p).unwrap_err().kind,
        ErrorKind::ReadLimitExceeded
    );

    // A list of void costs nothing on the wire but is still charged.
    let arena = ReaderArenaImpl::new(segment_with_root(0x01, 100 << 3), options);
    let p = arena.root_pointer().unwrap();
    assert_eq!(
        list_shape(&arena, &p).unwrap_err().kind,
        ErrorKind::ReadLimitExceeded
    );
}

#[test]
fn single_far_pointer() {
    let mut first = vec![0u8; 8];
    write_u32(&mut first, 0, (2 << 3) | 0x02);
    write_u32(&mut first, 4, 1);

    let mut second = vec![0u8; 40];
    write_u32(&mut second, 16, 0x00);
    write_u32(&mut second, 20, (1 << 16) | 1);

    let arena = arena(vec![first, second]);
    let p = arena.root_pointer().unwrap();
    assert_eq!(p.object.segment.id, 1);
    assert_eq!(p.object.position, 24);
    assert_eq!(
        struct_shape(&arena, &p).unwrap(),
        StructShape {
            data: 1,
            pointers: 1,
        }
    );
}

#[test]
fn double_far_pointer() {
    let mut first = vec![0u8; 8];
    write_u32(&mut first, 0, (1 << 2) | 0x02);
    write_u32(&mut first, 4, 1);

    let mut pad = vec![0u8; 16];
    write_u32(&mut pad, 0, 0x02);
    write_u32(&mut pad, 4, 2);
    write_u32(&mut pad, 8, 0x01);
    write_u32(&mut pad, 12, (3 << 3) | 2);

    let content = vec![0xaau8; 8];

    let arena = arena(vec![first, pad, content]);
    let p = arena.root_pointer().unwrap();
    assert_eq!(p.object.segment.id, 2);
    assert_eq!(p.object.position, 0);
    assert_eq!(
        list_shape(&arena, &p).unwrap(),
        ListShape {
            size: ElementShape::Byte,
        }
    );
}

#[test]
fn double_far_pad_must_be_far() {
    let mut first = vec![0u8; 8];
    write_u32(&mut first, 0, (1 << 2) | 0x02);
    write_u32(&mut first, 4, 1);

    let pad = vec![0u8; 16];

    let arena = arena(vec![first, pad]);
    assert_eq!(
        arena.root_pointer().unwrap_err().kind,
        ErrorKind::MessageContainsFarPointerWhereLandingPadWasExpected
    );
}

#[test]
fn far_pointer_into_missing_segment() {
    let mut first = vec![0u8; 8];
    write_u32(&mut first, 0, 0x02);
    write_u32(&mut first, 4, 9);

    let arena = arena(vec![first]);
    assert_eq!(
        arena.root_pointer().unwrap_err().kind,
        ErrorKind::InvalidSegmentId(9)
    );
}

#[test]
fn validated_shape_through_trait_object() {
    let arena = arena(segment_with_root(0x01, (3 << 3) | 5));
    let p = arena.root_pointer().unwrap();
    let dynamic: &dyn ReaderArena = &arena;
    assert_eq!(
        list_shape(dynamic, &p).unwrap(),
        ListShape {
            size: ElementShape::EightBytes,
        }
    );
}

#[test]
fn inline_composite_without_room_for_tag() {
    let mut raw = vec![0u8; 8];
    write_u32(&mut raw, 0, 0x01);
    write_u32(&mut raw, 4, 0x07);
    let truncated = arena(vec![raw]);
    assert_eq!(
        truncated.root_pointer().unwrap_err().kind,
        ErrorKind::MessageContainsOutOfBoundsPointer
    );

    // Other list sizes may still point at the end of the segment.
    let mut raw = vec![0u8; 8];
    write_u32(&mut raw, 0, 0x01);
    write_u32(&mut raw, 4, 0x02);
    let empty_bytes = arena(vec![raw]);
    let p = empty_bytes.root_pointer().unwrap();
    assert_eq!(p.object.position, 8);
    assert_eq!(
        any_shape(&p),
        Shape::List(ListShape {
            size: ElementShape::Byte,
        })
    );
}

#[test]
fn double_far_inline_composite_without_room_for_tag() {
    let mut first = vec![0u8; 8];
    write_u32(&mut first, 0, (1 << 2) | 0x02);
    write_u32(&mut first, 4, 1);

    let mut pad = vec![0u8; 16];
    write_u32(&mut pad, 0, (1 << 3) | 0x02);
    write_u32(&mut pad, 4, 2);
    write_u32(&mut pad, 8, 0x01);
    write_u32(&mut pad, 12, 0x07);

    let content = vec![0u8; 8];

    let arena = arena(vec![first, pad, content]);
    assert_eq!(
        arena.root_pointer().unwrap_err().kind,
        ErrorKind::MessageContainsOutOfBoundsPointer
    );
}

#[test]
fn rejected_validation_does_not_charge_read_limit() {
    let mut options = ReaderOptions::new();
    options.traversal_limit_in_words(5);

    let mut segments = segment_with_root(0x01, (10 << 3) | 5);
    write_u32(&mut segments[0], 8, 0x00);
    write_u32(&mut segments[0], 12, (2 << 16) | 3);
    let arena = ReaderArenaImpl::new(segments, options);

    let list = arena.root_pointer().unwrap();
    for _ in 0..3 {
        assert!(struct_shape(&arena, &list)
            .unwrap_err()
            .is_pointer_type_error());
        assert!(cap_shape(&arena, &list).unwrap_err().is_pointer_type_error());
    }

    // The struct at word 1 spans exactly the whole limit.
    let p = arena.pointer_at(0, 1).unwrap();
    assert_eq!(
        struct_shape(&arena, &p).unwrap(),
        StructShape {
            data: 3,
            pointers: 2,
        }
    );
    assert_eq!(
        struct_shape(&arena, &p).unwrap_err().kind,
        ErrorKind::ReadLimitExceeded
    );
}
