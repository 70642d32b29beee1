//! Target memory-layout profile.
//!
//! Supplied to the virtual machine at construction rather than read
//! from environment or config files — in a full pipeline this comes
//! from the (out-of-scope) code generator's module, exactly as the
//! reference VM takes `module->sizes` from its caller.

use sema_core::{BasicKind, TypeId, TypeInterner, TypeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy)]
pub struct TargetSizes {
    pub pointer_size: u32,
    pub pointer_align: u32,
    pub endian: Endian,
}

impl TargetSizes {
    pub fn host_64bit_little_endian() -> Self {
        TargetSizes {
            pointer_size: 8,
            pointer_align: 8,
            endian: Endian::Little,
        }
    }

    pub fn host_32bit_little_endian() -> Self {
        TargetSizes {
            pointer_size: 4,
            pointer_align: 4,
            endian: Endian::Little,
        }
    }

    /// `int`/`uint`/`rawptr` are pointer-width; every other basic kind
    /// carries its own fixed width. `string` is two pointer-words
    /// (data pointer + length); `any` is two pointer-words (type info
    /// + data pointer).
    pub fn size_of(&self, interner: &TypeInterner, ty: TypeId) -> u64 {
        let base = sema_core::base_type(interner, ty);
        match &interner.get(base).kind {
            TypeKind::Basic(b) => match b.fixed_size() {
                Some(n) => n as u64,
                None => match b {
                    BasicKind::Int | BasicKind::Uint | BasicKind::RawPtr => {
                        self.pointer_size as u64
                    }
                    BasicKind::String | BasicKind::Any => 2 * self.pointer_size as u64,
                    _ => unreachable!("fixed_size() already covers every other basic kind"),
                },
            },
            TypeKind::Pointer(_) => self.pointer_size as u64,
            TypeKind::Array { elem, count } => self.size_of(interner, *elem) * *count as u64,
            TypeKind::Slice(_) => 2 * self.pointer_size as u64,
            TypeKind::Struct { fields } | TypeKind::RawUnion { fields } => {
                let mut offset = 0u64;
                for f in fields {
                    let align = self.align_of(interner, f.ty);
                    offset = align_up(offset, align);
                    offset += self.size_of(interner, f.ty);
                }
                align_up(offset, self.align_of(interner, base))
            }
            TypeKind::Union { variants } => {
                // Tagged union: one pointer-width discriminant
                // followed by the widest variant payload.
                let payload = variants
                    .iter()
                    .map(|f| self.size_of(interner, f.ty))
                    .max()
                    .unwrap_or(0);
                self.pointer_size as u64 + payload
            }
            TypeKind::Proc { .. } => self.pointer_size as u64,
            TypeKind::Tuple(elems) => elems.iter().map(|e| self.size_of(interner, *e)).sum(),
            TypeKind::Named { base, .. } => self.size_of(interner, *base),
            TypeKind::Invalid => 0,
        }
    }

    pub fn align_of(&self, interner: &TypeInterner, ty: TypeId) -> u64 {
        let base = sema_core::base_type(interner, ty);
        match &interner.get(base).kind {
            TypeKind::Basic(b) => match b.fixed_size() {
                Some(n) => n as u64,
                None => self.pointer_size as u64,
            },
            TypeKind::Pointer(_) | TypeKind::Proc { .. } => self.pointer_size as u64,
            TypeKind::Array { elem, .. } => self.align_of(interner, *elem),
            TypeKind::Slice(_) => self.pointer_size as u64,
            TypeKind::Struct { fields } | TypeKind::RawUnion { fields } => fields
                .iter()
                .map(|f| self.align_of(interner, f.ty))
                .max()
                .unwrap_or(1),
            TypeKind::Union { .. } => self.pointer_size as u64,
            TypeKind::Tuple(elems) => elems
                .iter()
                .map(|e| self.align_of(interner, *e))
                .max()
                .unwrap_or(1),
            TypeKind::Named { base, .. } => self.align_of(interner, *base),
            TypeKind::Invalid => 1,
        }
    }

    /// Byte offset of field `index` within a struct/raw_union type.
    pub fn offset_of(&self, interner: &TypeInterner, ty: TypeId, index: usize) -> u64 {
        let base = sema_core::base_type(interner, ty);
        let fields = sema_core::fields_of(interner, base);
        let mut offset = 0u64;
        for f in fields.iter().take(index + 1) {
            let align = self.align_of(interner, f.ty);
            offset = align_up(offset, align);
            if f.field_index == index {
                return offset;
            }
            offset += self.size_of(interner, f.ty);
        }
        offset
    }
}

fn align_up(offset: u64, align: u64) -> u64 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use sema_core::Field;

    #[test]
    fn struct_fields_are_aligned_and_padded() {
        let mut i = TypeInterner::new();
        let u8_ty = i.intern(TypeKind::Basic(BasicKind::U8));
        let i32_ty = i.intern(TypeKind::Basic(BasicKind::I32));
        let s = i.intern(TypeKind::Struct {
            fields: vec![
                Field {
                    name: "a".into(),
                    ty: u8_ty,
                    field_index: 0,
                },
                Field {
                    name: "b".into(),
                    ty: i32_ty,
                    field_index: 1,
                },
            ],
        });
        let sizes = TargetSizes::host_64bit_little_endian();
        assert_eq!(sizes.offset_of(&i, s, 1), 4);
        assert_eq!(sizes.size_of(&i, s), 8);
    }

    #[test]
    fn string_is_two_pointer_words() {
        let mut i = TypeInterner::new();
        let s = i.string_type();
        let sizes = TargetSizes::host_64bit_little_endian();
        assert_eq!(sizes.size_of(&i, s), 16);
    }
}
