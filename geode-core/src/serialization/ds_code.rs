//! Wire type identifiers: DSCodes, fixed IDs and the unified class-ID space.

use std::fmt;

/// Single-byte type codes for built-in wire types and framing escapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum DsCode {
    FixedIdDefault = 0,
    FixedIdByte = 1,
    FixedIdShort = 2,
    FixedIdInt = 3,
    FixedIdNone = 4,
    CacheableLinkedList = 10,
    Properties = 11,
    BooleanArray = 26,
    CharArray = 27,
    CacheableUserData4 = 37,
    CacheableUserData2 = 38,
    CacheableUserData = 39,
    NullObj = 41,
    CacheableString = 42,
    Class = 43,
    CacheableBytes = 46,
    CacheableInt16Array = 47,
    CacheableInt32Array = 48,
    CacheableInt64Array = 49,
    CacheableFloatArray = 50,
    CacheableDoubleArray = 51,
    CacheableObjectArray = 52,
    CacheableBoolean = 53,
    CacheableCharacter = 54,
    CacheableByte = 55,
    CacheableInt16 = 56,
    CacheableInt32 = 57,
    CacheableInt64 = 58,
    CacheableFloat = 59,
    CacheableDouble = 60,
    CacheableDate = 61,
    CacheableFileName = 63,
    CacheableStringArray = 64,
    CacheableArrayList = 65,
    CacheableHashSet = 66,
    CacheableHashMap = 67,
    CacheableNullString = 69,
    CacheableHashTable = 70,
    CacheableVector = 71,
    CacheableIdentityHashMap = 72,
    CacheableLinkedHashSet = 73,
    CacheableStack = 74,
    CacheableAsciiString = 87,
    CacheableAsciiStringHuge = 88,
    CacheableStringHuge = 89,
    Pdx = 93,
    PdxEnum = 94,
}

impl DsCode {
    /// Every code, in ascending wire order.
    pub const ALL: [DsCode; 47] = [
        DsCode::FixedIdDefault,
        DsCode::FixedIdByte,
        DsCode::FixedIdShort,
        DsCode::FixedIdInt,
        DsCode::FixedIdNone,
        DsCode::CacheableLinkedList,
        DsCode::Properties,
        DsCode::BooleanArray,
        DsCode::CharArray,
        DsCode::CacheableUserData4,
        DsCode::CacheableUserData2,
        DsCode::CacheableUserData,
        DsCode::NullObj,
        DsCode::CacheableString,
        DsCode::Class,
        DsCode::CacheableBytes,
        DsCode::CacheableInt16Array,
        DsCode::CacheableInt32Array,
        DsCode::CacheableInt64Array,
        DsCode::CacheableFloatArray,
        DsCode::CacheableDoubleArray,
        DsCode::CacheableObjectArray,
        DsCode::CacheableBoolean,
        DsCode::CacheableCharacter,
        DsCode::CacheableByte,
        DsCode::CacheableInt16,
        DsCode::CacheableInt32,
        DsCode::CacheableInt64,
        DsCode::CacheableFloat,
        DsCode::CacheableDouble,
        DsCode::CacheableDate,
        DsCode::CacheableFileName,
        DsCode::CacheableStringArray,
        DsCode::CacheableArrayList,
        DsCode::CacheableHashSet,
        DsCode::CacheableHashMap,
        DsCode::CacheableNullString,
        DsCode::CacheableHashTable,
        DsCode::CacheableVector,
        DsCode::CacheableIdentityHashMap,
        DsCode::CacheableLinkedHashSet,
        DsCode::CacheableStack,
        DsCode::CacheableAsciiString,
        DsCode::CacheableAsciiStringHuge,
        DsCode::CacheableStringHuge,
        DsCode::Pdx,
        DsCode::PdxEnum,
    ];

    /// Returns the wire byte.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Decodes a wire byte, or `None` for bytes that are not codes.
    pub fn from_id(id: u8) -> Option<Self> {
        let code = match id {
            0 => DsCode::FixedIdDefault,
            1 => DsCode::FixedIdByte,
            2 => DsCode::FixedIdShort,
            3 => DsCode::FixedIdInt,
            4 => DsCode::FixedIdNone,
            10 => DsCode::CacheableLinkedList,
            11 => DsCode::Properties,
            26 => DsCode::BooleanArray,
            27 => DsCode::CharArray,
            37 => DsCode::CacheableUserData4,
            38 => DsCode::CacheableUserData2,
            39 => DsCode::CacheableUserData,
            41 => DsCode::NullObj,
            42 => DsCode::CacheableString,
            43 => DsCode::Class,
            46 => DsCode::CacheableBytes,
            47 => DsCode::CacheableInt16Array,
            48 => DsCode::CacheableInt32Array,
            49 => DsCode::CacheableInt64Array,
            50 => DsCode::CacheableFloatArray,
            51 => DsCode::CacheableDoubleArray,
            52 => DsCode::CacheableObjectArray,
            53 => DsCode::CacheableBoolean,
            54 => DsCode::CacheableCharacter,
            55 => DsCode::CacheableByte,
            56 => DsCode::CacheableInt16,
            57 => DsCode::CacheableInt32,
            58 => DsCode::CacheableInt64,
            59 => DsCode::CacheableFloat,
            60 => DsCode::CacheableDouble,
            61 => DsCode::CacheableDate,
            63 => DsCode::CacheableFileName,
            64 => DsCode::CacheableStringArray,
            65 => DsCode::CacheableArrayList,
            66 => DsCode::CacheableHashSet,
            67 => DsCode::CacheableHashMap,
            69 => DsCode::CacheableNullString,
            70 => DsCode::CacheableHashTable,
            71 => DsCode::CacheableVector,
            72 => DsCode::CacheableIdentityHashMap,
            73 => DsCode::CacheableLinkedHashSet,
            74 => DsCode::CacheableStack,
            87 => DsCode::CacheableAsciiString,
            88 => DsCode::CacheableAsciiStringHuge,
            89 => DsCode::CacheableStringHuge,
            93 => DsCode::Pdx,
            94 => DsCode::PdxEnum,
            _ => return None,
        };
        Some(code)
    }

    /// Codes that introduce a fixed ID of 1, 2 or 4 bytes.
    pub fn is_fixed_id_escape(self) -> bool {
        matches!(
            self,
            DsCode::FixedIdByte | DsCode::FixedIdShort | DsCode::FixedIdInt
        )
    }

    /// Codes that introduce a user class ID of 1, 2 or 4 bytes.
    pub fn is_user_data_escape(self) -> bool {
        matches!(
            self,
            DsCode::CacheableUserData | DsCode::CacheableUserData2 | DsCode::CacheableUserData4
        )
    }

    /// Codes the registry dispatches itself and never hands to a reader table.
    pub fn is_framing(self) -> bool {
        self.is_fixed_id_escape()
            || self.is_user_data_escape()
            || matches!(
                self,
                DsCode::FixedIdDefault
                    | DsCode::FixedIdNone
                    | DsCode::NullObj
                    | DsCode::CacheableNullString
                    | DsCode::Class
                    | DsCode::Pdx
                    | DsCode::PdxEnum
            )
    }
}

impl fmt::Display for DsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.id())
    }
}

/// Fixed IDs of the internal framework types.
pub mod fixed_id {
    /// Enum constant descriptor.
    pub const ENUM_INFO: i32 = 9;
    /// PDX type definition.
    pub const PDX_TYPE: i32 = 17;
    /// The query "undefined" token.
    pub const CACHEABLE_UNDEFINED: i32 = 31;
    /// Query result struct.
    pub const STRUCT: i32 = 32;
}

/// Chooses the escape code for a fixed ID by magnitude.
pub fn fixed_id_escape(id: i32) -> DsCode {
    if i8::try_from(id).is_ok() {
        DsCode::FixedIdByte
    } else if i16::try_from(id).is_ok() {
        DsCode::FixedIdShort
    } else {
        DsCode::FixedIdInt
    }
}

/// Chooses the escape code for a user class ID by magnitude.
pub fn user_data_escape(class_id: i32) -> DsCode {
    if (0..=0x7F).contains(&class_id) {
        DsCode::CacheableUserData
    } else if (0..=0x7FFF).contains(&class_id) {
        DsCode::CacheableUserData2
    } else {
        DsCode::CacheableUserData4
    }
}

const BUILT_IN_BASE: u32 = 0x8000_0000;
const FIXED_ID_TIER: u32 = 0x2000_0000;

/// Where a [`ClassId`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassIdOrigin {
    /// A user-registered data-serializable type.
    User(i32),
    /// A built-in type addressed by its DSCode.
    BuiltIn(DsCode),
    /// A framework type addressed by its fixed ID.
    FixedId(i32),
}

/// A 32-bit identifier covering user, built-in and fixed-ID types.
///
/// User IDs occupy `0..0x8000_0000`. Built-in DSCodes are offset by
/// `0x8000_0000`, and fixed IDs additionally by `0x2000_0000` per escape
/// tier, so one number identifies a type without a separate tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    /// Wraps a raw 32-bit value.
    pub const fn from_raw(raw: u32) -> Self {
        ClassId(raw)
    }

    /// A user class ID. Negative IDs are not representable.
    pub fn user(class_id: i32) -> Option<Self> {
        u32::try_from(class_id).ok().map(ClassId)
    }

    /// The class ID of a built-in DSCode.
    pub const fn built_in(code: DsCode) -> Self {
        ClassId(BUILT_IN_BASE + code as u32)
    }

    /// The class ID of a fixed ID, tiered by the escape it travels under.
    pub fn fixed_id(id: i32) -> Self {
        let tier = match fixed_id_escape(id) {
            DsCode::FixedIdByte => 1,
            DsCode::FixedIdShort => 2,
            _ => 3,
        };
        ClassId(BUILT_IN_BASE + tier * FIXED_ID_TIER + (id as u32 & (FIXED_ID_TIER - 1)))
    }

    /// Returns the raw 32-bit value.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The DSCode that introduces this type on the wire.
    pub fn type_id(self) -> Option<DsCode> {
        if self.0 >= BUILT_IN_BASE {
            let code = (self.0 - BUILT_IN_BASE) % FIXED_ID_TIER;
            match self.dsfid() {
                0 => u8::try_from(code).ok().and_then(DsCode::from_id),
                1 => Some(DsCode::FixedIdByte),
                2 => Some(DsCode::FixedIdShort),
                _ => Some(DsCode::FixedIdInt),
            }
        } else {
            Some(user_data_escape(self.0 as i32))
        }
    }

    /// The fixed-ID escape tier: 0 for built-ins and user types.
    pub fn dsfid(self) -> u32 {
        if self.0 >= BUILT_IN_BASE {
            (self.0 - BUILT_IN_BASE) / FIXED_ID_TIER
        } else {
            0
        }
    }

    /// Splits the ID back into its numbering space.
    pub fn origin(self) -> Option<ClassIdOrigin> {
        if self.0 < BUILT_IN_BASE {
            return Some(ClassIdOrigin::User(self.0 as i32));
        }
        let low = (self.0 - BUILT_IN_BASE) % FIXED_ID_TIER;
        match self.dsfid() {
            0 => u8::try_from(low)
                .ok()
                .and_then(DsCode::from_id)
                .map(ClassIdOrigin::BuiltIn),
            tier => {
                let id = match tier {
                    1 => low as u8 as i8 as i32,
                    2 => low as u16 as i16 as i32,
                    _ => {
                        // Sign-extend the 29 bits that fit below the tier.
                        ((low << 3) as i32) >> 3
                    }
                };
                Some(ClassIdOrigin::FixedId(id))
            }
        }
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
