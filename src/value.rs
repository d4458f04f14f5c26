//! Typed PLC values and their S7 byte encodings.
//!
//! [`PlcValue`] is the closed set of values the access layer can write,
//! read and log. [`encode`] turns a value into the bytes the PLC stores and
//! [`decode`] does the reverse for a requested [`VarType`] and element
//! count. All S7 encodings are big-endian.
//!
//! Shapes the codec cannot express produce `None` rather than an error:
//! callers treat that as "not applicable".
//!
//! # Example
//!
//! ```
//! use s7_gate::value::{decode, encode, PlcValue, VarType};
//!
//! let bytes = encode(&PlcValue::Int(-2)).unwrap();
//! assert_eq!(bytes, vec![0xFF, 0xFE]);
//!
//! assert_eq!(decode(VarType::Int, &bytes, 1), Some(PlcValue::Int(-2)));
//! assert_eq!(decode(VarType::DInt, &bytes, 1), None); // too short
//! ```

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Semantic type tag used to request a typed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarType {
    /// Single bit / packed bits.
    Bit,
    /// Unsigned 8-bit.
    Byte,
    /// Unsigned 16-bit (WORD).
    Word,
    /// Unsigned 32-bit (DWORD).
    DWord,
    /// Signed 16-bit (INT).
    Int,
    /// Signed 32-bit (DINT).
    DInt,
    /// 32-bit float (REAL).
    Real,
    /// 64-bit float (LREAL).
    LReal,
    /// S7 STRING (max length, actual length, characters).
    String,
    /// S5TIME timer value, in seconds.
    Timer,
    /// BCD counter value.
    Counter,
    /// S7 DATE_AND_TIME.
    DateTime,
}

impl VarType {
    /// Number of bytes occupied by `count` elements of this type.
    ///
    /// For [`VarType::String`], `count` is the maximum string length and the
    /// two header bytes are included.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_gate::value::VarType;
    ///
    /// assert_eq!(VarType::Real.byte_len(3), Some(12));
    /// assert_eq!(VarType::Bit.byte_len(9), Some(2));
    /// assert_eq!(VarType::String.byte_len(10), Some(12));
    /// assert_eq!(VarType::LReal.byte_len(usize::MAX / 4), None);
    /// ```
    pub fn byte_len(self, count: usize) -> Option<usize> {
        match self {
            VarType::Bit => Some(count.div_ceil(8)),
            VarType::Byte => Some(count),
            VarType::Word | VarType::Int | VarType::Timer | VarType::Counter => count.checked_mul(2),
            VarType::DWord | VarType::DInt | VarType::Real => count.checked_mul(4),
            VarType::LReal | VarType::DateTime => count.checked_mul(8),
            VarType::String => count.checked_add(2),
        }
    }
}

/// A value read from or written to the PLC.
///
/// Scalar variants decode from a count of 1, the `*Array` variants from any
/// larger count.
#[derive(Debug, Clone, PartialEq)]
pub enum PlcValue {
    /// Single bit.
    Bool(bool),
    /// Bits, least significant bit of the first byte first.
    BitArray(Vec<bool>),
    /// Single byte.
    Byte(u8),
    /// Raw byte sequence.
    Bytes(Vec<u8>),
    /// WORD.
    Word(u16),
    /// WORD array.
    WordArray(Vec<u16>),
    /// DWORD.
    DWord(u32),
    /// DWORD array.
    DWordArray(Vec<u32>),
    /// INT.
    Int(i16),
    /// INT array.
    IntArray(Vec<i16>),
    /// DINT.
    DInt(i32),
    /// DINT array.
    DIntArray(Vec<i32>),
    /// REAL.
    Real(f32),
    /// REAL array.
    RealArray(Vec<f32>),
    /// LREAL.
    LReal(f64),
    /// LREAL array.
    LRealArray(Vec<f64>),
    /// ASCII string.
    String(String),
    /// Timer value in seconds.
    Timer(f64),
    /// Timer array.
    TimerArray(Vec<f64>),
    /// Counter value (0-999).
    Counter(u16),
    /// Counter array.
    CounterArray(Vec<u16>),
    /// Date and time, millisecond resolution.
    DateTime(NaiveDateTime),
    /// Date and time array.
    DateTimeArray(Vec<NaiveDateTime>),
}

impl PlcValue {
    /// Returns the type tag this value is stored as.
    pub fn var_type(&self) -> VarType {
        match self {
            PlcValue::Bool(_) | PlcValue::BitArray(_) => VarType::Bit,
            PlcValue::Byte(_) | PlcValue::Bytes(_) => VarType::Byte,
            PlcValue::Word(_) | PlcValue::WordArray(_) => VarType::Word,
            PlcValue::DWord(_) | PlcValue::DWordArray(_) => VarType::DWord,
            PlcValue::Int(_) | PlcValue::IntArray(_) => VarType::Int,
            PlcValue::DInt(_) | PlcValue::DIntArray(_) => VarType::DInt,
            PlcValue::Real(_) | PlcValue::RealArray(_) => VarType::Real,
            PlcValue::LReal(_) | PlcValue::LRealArray(_) => VarType::LReal,
            PlcValue::String(_) => VarType::String,
            PlcValue::Timer(_) | PlcValue::TimerArray(_) => VarType::Timer,
            PlcValue::Counter(_) | PlcValue::CounterArray(_) => VarType::Counter,
            PlcValue::DateTime(_) | PlcValue::DateTimeArray(_) => VarType::DateTime,
        }
    }

    /// Returns the element count of this value.
    ///
    /// Strings report their length, so `var_type().byte_len(count())` gives
    /// the encoded size.
    pub fn count(&self) -> usize {
        match self {
            PlcValue::BitArray(v) => v.len(),
            PlcValue::Bytes(v) => v.len(),
            PlcValue::WordArray(v) => v.len(),
            PlcValue::DWordArray(v) => v.len(),
            PlcValue::IntArray(v) => v.len(),
            PlcValue::DIntArray(v) => v.len(),
            PlcValue::RealArray(v) => v.len(),
            PlcValue::LRealArray(v) => v.len(),
            PlcValue::String(s) => s.len(),
            PlcValue::TimerArray(v) => v.len(),
            PlcValue::CounterArray(v) => v.len(),
            PlcValue::DateTimeArray(v) => v.len(),
            _ => 1,
        }
    }
}

fn fmt_list<T: std::fmt::Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

impl std::fmt::Display for PlcValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlcValue::Bool(v) => write!(f, "{}", v),
            PlcValue::BitArray(v) => fmt_list(f, v),
            PlcValue::Byte(v) => write!(f, "{}", v),
            PlcValue::Bytes(v) => fmt_list(f, v),
            PlcValue::Word(v) => write!(f, "{}", v),
            PlcValue::WordArray(v) => fmt_list(f, v),
            PlcValue::DWord(v) => write!(f, "{}", v),
            PlcValue::DWordArray(v) => fmt_list(f, v),
            PlcValue::Int(v) => write!(f, "{}", v),
            PlcValue::IntArray(v) => fmt_list(f, v),
            PlcValue::DInt(v) => write!(f, "{}", v),
            PlcValue::DIntArray(v) => fmt_list(f, v),
            PlcValue::Real(v) => write!(f, "{}", v),
            PlcValue::RealArray(v) => fmt_list(f, v),
            PlcValue::LReal(v) => write!(f, "{}", v),
            PlcValue::LRealArray(v) => fmt_list(f, v),
            PlcValue::String(v) => write!(f, "{}", v),
            PlcValue::Timer(v) => write!(f, "{}s", v),
            PlcValue::TimerArray(v) => fmt_list(f, v),
            PlcValue::Counter(v) => write!(f, "{}", v),
            PlcValue::CounterArray(v) => fmt_list(f, v),
            PlcValue::DateTime(v) => write!(f, "{}", v.format(DATE_TIME_FORMAT)),
            PlcValue::DateTimeArray(v) => {
                let items: Vec<_> = v.iter().map(|d| d.format(DATE_TIME_FORMAT)).collect();
                fmt_list(f, &items)
            }
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PlcValue {
                fn from(value: $ty) -> Self {
                    PlcValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    Vec<bool> => BitArray,
    u8 => Byte,
    Vec<u8> => Bytes,
    u16 => Word,
    Vec<u16> => WordArray,
    u32 => DWord,
    Vec<u32> => DWordArray,
    i16 => Int,
    Vec<i16> => IntArray,
    i32 => DInt,
    Vec<i32> => DIntArray,
    f32 => Real,
    Vec<f32> => RealArray,
    f64 => LReal,
    Vec<f64> => LRealArray,
    String => String,
    NaiveDateTime => DateTime,
    Vec<NaiveDateTime> => DateTimeArray,
}

impl From<&str> for PlcValue {
    fn from(value: &str) -> Self {
        PlcValue::String(value.to_string())
    }
}

/// Rust types that can be read as a single PLC value.
///
/// Used by [`GatedTransport::read_as`](crate::GatedTransport::read_as).
pub trait PlcScalar: Sized {
    /// Type tag requested from the PLC.
    const VAR_TYPE: VarType;

    /// Extracts `Self` from a decoded value, `None` on a shape mismatch.
    fn from_value(value: PlcValue) -> Option<Self>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $tag:ident / $variant:ident),* $(,)?) => {
        $(
            impl PlcScalar for $ty {
                const VAR_TYPE: VarType = VarType::$tag;

                fn from_value(value: PlcValue) -> Option<Self> {
                    match value {
                        PlcValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_scalar! {
    bool => Bit / Bool,
    u8 => Byte / Byte,
    u16 => Word / Word,
    u32 => DWord / DWord,
    i16 => Int / Int,
    i32 => DInt / DInt,
    f32 => Real / Real,
    f64 => LReal / LReal,
}

/// Maximum length of an S7 STRING.
pub const MAX_STRING_LEN: usize = 254;

// S5TIME time bases in milliseconds, indexed by the 2-bit base code.
const TIMER_BASES_MS: [u64; 4] = [10, 100, 1_000, 10_000];

// 999 units of the 10 s base.
const MAX_TIMER_SECONDS: f64 = 9_990.0;

#[inline]
fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

#[inline]
fn from_bcd(byte: u8) -> Option<u8> {
    let (hi, lo) = (byte >> 4, byte & 0x0F);
    if hi > 9 || lo > 9 {
        return None;
    }
    Some(hi * 10 + lo)
}

fn encode_timer(seconds: f64) -> Option<[u8; 2]> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    if seconds > MAX_TIMER_SECONDS {
        return None;
    }
    let millis = (seconds * 1000.0).round() as u64;
    let (base, units) = TIMER_BASES_MS
        .iter()
        .enumerate()
        .map(|(code, base)| (code as u8, millis.saturating_add(base / 2) / base))
        .find(|&(_, units)| units <= 999)?;
    let units = units as u16;
    Some([
        (base << 4) | (units / 100) as u8,
        to_bcd((units % 100) as u8),
    ])
}

fn decode_timer(bytes: &[u8]) -> Option<f64> {
    let base = TIMER_BASES_MS[usize::from((bytes[0] >> 4) & 0x03)];
    let hundreds = bytes[0] & 0x0F;
    if hundreds > 9 {
        return None;
    }
    let units = u64::from(hundreds) * 100 + u64::from(from_bcd(bytes[1])?);
    Some((units * base) as f64 / 1000.0)
}

fn encode_counter(value: u16) -> Option<[u8; 2]> {
    if value > 999 {
        return None;
    }
    Some([(value / 100) as u8, to_bcd((value % 100) as u8)])
}

fn decode_counter(bytes: &[u8]) -> Option<u16> {
    let hundreds = from_bcd(bytes[0])?;
    if hundreds > 9 {
        return None;
    }
    Some(u16::from(hundreds) * 100 + u16::from(from_bcd(bytes[1])?))
}

fn encode_date_time(value: &NaiveDateTime) -> Option<[u8; 8]> {
    let year = value.year();
    if !(1990..=2089).contains(&year) {
        return None;
    }
    let millis = value.nanosecond() / 1_000_000;
    if millis > 999 {
        // leap second representation
        return None;
    }
    let weekday = value.weekday().number_from_sunday() as u8;
    Some([
        to_bcd((year % 100) as u8),
        to_bcd(value.month() as u8),
        to_bcd(value.day() as u8),
        to_bcd(value.hour() as u8),
        to_bcd(value.minute() as u8),
        to_bcd(value.second() as u8),
        to_bcd((millis / 10) as u8),
        (((millis % 10) as u8) << 4) | weekday,
    ])
}

fn decode_date_time(bytes: &[u8]) -> Option<NaiveDateTime> {
    let yy = i32::from(from_bcd(bytes[0])?);
    let year = if yy >= 90 { 1900 + yy } else { 2000 + yy };
    let ms_high = u32::from(from_bcd(bytes[6])?);
    let ms_low = u32::from(bytes[7] >> 4);
    if ms_low > 9 {
        return None;
    }
    NaiveDate::from_ymd_opt(
        year,
        u32::from(from_bcd(bytes[1])?),
        u32::from(from_bcd(bytes[2])?),
    )?
    .and_hms_milli_opt(
        u32::from(from_bcd(bytes[3])?),
        u32::from(from_bcd(bytes[4])?),
        u32::from(from_bcd(bytes[5])?),
        ms_high * 10 + ms_low,
    )
}

fn encode_string(value: &str) -> Option<Vec<u8>> {
    if !value.is_ascii() || value.len() > MAX_STRING_LEN {
        return None;
    }
    let len = value.len() as u8;
    let mut bytes = Vec::with_capacity(value.len() + 2);
    bytes.push(len);
    bytes.push(len);
    bytes.extend_from_slice(value.as_bytes());
    Some(bytes)
}

fn decode_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 2 {
        return None;
    }
    let len = usize::from(bytes[1]);
    let chars = bytes.get(2..2 + len)?;
    Some(chars.iter().map(|&b| char::from(b)).collect())
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

fn flat<T, const N: usize>(items: &[T], f: impl Fn(&T) -> [u8; N]) -> Vec<u8> {
    items.iter().flat_map(f).collect()
}

fn flat_opt<T, const N: usize>(items: &[T], f: impl Fn(&T) -> Option<[u8; N]>) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(items.len() * N);
    for item in items {
        bytes.extend_from_slice(&f(item)?);
    }
    Some(bytes)
}

/// Encodes a value into its S7 byte representation.
///
/// Returns `None` for values outside the range of their S7 type: non-ASCII
/// or over-long strings, dates outside 1990-2089, timers outside 0-9990 s,
/// counters above 999.
///
/// # Example
///
/// ```
/// use s7_gate::value::{encode, PlcValue};
///
/// assert_eq!(encode(&PlcValue::Bool(true)), Some(vec![1]));
/// assert_eq!(encode(&PlcValue::Real(1.0)), Some(vec![0x3F, 0x80, 0x00, 0x00]));
/// assert_eq!(encode(&PlcValue::String("AB".into())), Some(vec![2, 2, b'A', b'B']));
/// assert_eq!(encode(&PlcValue::Counter(1000)), None);
/// ```
pub fn encode(value: &PlcValue) -> Option<Vec<u8>> {
    let bytes = match value {
        PlcValue::Bool(v) => vec![u8::from(*v)],
        PlcValue::BitArray(v) => pack_bits(v),
        PlcValue::Byte(v) => vec![*v],
        PlcValue::Bytes(v) => v.clone(),
        PlcValue::Word(v) => v.to_be_bytes().to_vec(),
        PlcValue::WordArray(v) => flat(v, |x| x.to_be_bytes()),
        PlcValue::DWord(v) => v.to_be_bytes().to_vec(),
        PlcValue::DWordArray(v) => flat(v, |x| x.to_be_bytes()),
        PlcValue::Int(v) => v.to_be_bytes().to_vec(),
        PlcValue::IntArray(v) => flat(v, |x| x.to_be_bytes()),
        PlcValue::DInt(v) => v.to_be_bytes().to_vec(),
        PlcValue::DIntArray(v) => flat(v, |x| x.to_be_bytes()),
        PlcValue::Real(v) => v.to_be_bytes().to_vec(),
        PlcValue::RealArray(v) => flat(v, |x| x.to_be_bytes()),
        PlcValue::LReal(v) => v.to_be_bytes().to_vec(),
        PlcValue::LRealArray(v) => flat(v, |x| x.to_be_bytes()),
        PlcValue::String(v) => encode_string(v)?,
        PlcValue::Timer(v) => encode_timer(*v)?.to_vec(),
        PlcValue::TimerArray(v) => flat_opt(v, |x| encode_timer(*x))?,
        PlcValue::Counter(v) => encode_counter(*v)?.to_vec(),
        PlcValue::CounterArray(v) => flat_opt(v, |x| encode_counter(*x))?,
        PlcValue::DateTime(v) => encode_date_time(v)?.to_vec(),
        PlcValue::DateTimeArray(v) => flat_opt(v, encode_date_time)?,
    };
    Some(bytes)
}

fn chunks<T, const N: usize>(
    bytes: &[u8],
    count: usize,
    f: impl Fn([u8; N]) -> T,
) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .take(count)
        .map(|c| {
            let mut arr = [0u8; N];
            arr.copy_from_slice(c);
            f(arr)
        })
        .collect()
}

fn chunks_opt<T, const N: usize>(
    bytes: &[u8],
    count: usize,
    f: impl Fn(&[u8]) -> Option<T>,
) -> Option<Vec<T>> {
    bytes.chunks_exact(N).take(count).map(f).collect()
}

/// Decodes `count` elements of `var_type` from `bytes`.
///
/// A count of 1 yields a scalar variant, a larger count yields the matching
/// `*Array` variant with exactly `count` elements (strings ignore `count`
/// and use their own length header). Returns `None` when the buffer is
/// empty or too short, `count` is 0, or the bytes are not a valid encoding.
///
/// # Example
///
/// ```
/// use s7_gate::value::{decode, PlcValue, VarType};
///
/// let bytes = [0x00, 0x01, 0x00, 0x02];
/// assert_eq!(decode(VarType::Word, &bytes, 1), Some(PlcValue::Word(1)));
/// assert_eq!(decode(VarType::Word, &bytes, 2), Some(PlcValue::WordArray(vec![1, 2])));
/// assert_eq!(decode(VarType::Word, &bytes, 3), None);
/// ```
pub fn decode(var_type: VarType, bytes: &[u8], count: usize) -> Option<PlcValue> {
    if bytes.is_empty() || count == 0 {
        return None;
    }
    let needed = var_type.byte_len(count)?;
    if var_type != VarType::String && bytes.len() < needed {
        return None;
    }
    let scalar = count == 1;
    let value = match var_type {
        VarType::Bit if scalar => PlcValue::Bool(bytes[0] & 0x01 != 0),
        VarType::Bit => {
            PlcValue::BitArray((0..count).map(|i| bytes[i / 8] & (1 << (i % 8)) != 0).collect())
        }
        VarType::Byte if scalar => PlcValue::Byte(bytes[0]),
        VarType::Byte => PlcValue::Bytes(bytes[..count].to_vec()),
        VarType::Word if scalar => PlcValue::Word(u16::from_be_bytes([bytes[0], bytes[1]])),
        VarType::Word => PlcValue::WordArray(chunks(bytes, count, u16::from_be_bytes)),
        VarType::DWord => {
            let v = chunks(bytes, count, u32::from_be_bytes);
            if scalar {
                PlcValue::DWord(v[0])
            } else {
                PlcValue::DWordArray(v)
            }
        }
        VarType::Int if scalar => PlcValue::Int(i16::from_be_bytes([bytes[0], bytes[1]])),
        VarType::Int => PlcValue::IntArray(chunks(bytes, count, i16::from_be_bytes)),
        VarType::DInt => {
            let v = chunks(bytes, count, i32::from_be_bytes);
            if scalar {
                PlcValue::DInt(v[0])
            } else {
                PlcValue::DIntArray(v)
            }
        }
        VarType::Real => {
            let v = chunks(bytes, count, f32::from_be_bytes);
            if scalar {
                PlcValue::Real(v[0])
            } else {
                PlcValue::RealArray(v)
            }
        }
        VarType::LReal => {
            let v = chunks(bytes, count, f64::from_be_bytes);
            if scalar {
                PlcValue::LReal(v[0])
            } else {
                PlcValue::LRealArray(v)
            }
        }
        VarType::Timer => {
            let v = chunks_opt::<_, 2>(bytes, count, decode_timer)?;
            if scalar {
                PlcValue::Timer(v[0])
            } else {
                PlcValue::TimerArray(v)
            }
        }
        VarType::Counter => {
            let v = chunks_opt::<_, 2>(bytes, count, decode_counter)?;
            if scalar {
                PlcValue::Counter(v[0])
            } else {
                PlcValue::CounterArray(v)
            }
        }
        VarType::DateTime => {
            let v = chunks_opt::<_, 8>(bytes, count, decode_date_time)?;
            if scalar {
                PlcValue::DateTime(v[0])
            } else {
                PlcValue::DateTimeArray(v)
            }
        }
        VarType::String => PlcValue::String(decode_string(bytes)?),
    };
    Some(value)
}

/// Reads bit `bit` (0-7) of the first byte.
///
/// Returns `None` for an empty buffer or a bit index above 7.
///
/// # Example
///
/// ```
/// use s7_gate::value::decode_bit;
///
/// assert_eq!(decode_bit(&[0b0000_0100], 2), Some(true));
/// assert_eq!(decode_bit(&[0b0000_0100], 8), None);
/// ```
pub fn decode_bit(bytes: &[u8], bit: u8) -> Option<bool> {
    if bit > 7 {
        return None;
    }
    bytes.first().map(|b| b & (1 << bit) != 0)
}
