use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

// -----------------------------------------------------------------------------
// Shared by `Ptr` and `PtrMut`

macro_rules! impl_record_ptr {
    ($ptr:ident) => {
        impl $ptr<'_> {
            /// Returns `true` if the address is a multiple of `align_of::<T>()`.
            #[inline]
            pub fn is_aligned<T>(&self) -> bool {
                self.0.as_ptr().cast::<T>().is_aligned()
            }

            /// Panics on a misaligned `T` in debug builds, does nothing otherwise.
            #[cfg_attr(debug_assertions, track_caller)]
            #[cfg_attr(not(debug_assertions), inline(always))]
            pub fn debug_assert_aligned<T>(&self) {
                debug_assert!(
                    self.is_aligned::<T>(),
                    "{:p} is misaligned for `{}` (align {})",
                    self.0,
                    core::any::type_name::<T>(),
                    align_of::<T>(),
                );
            }

            /// Advances the pointer by `count` bytes.
            ///
            /// A record pointer becomes a field pointer with
            /// `record.byte_add(field_offset)`.
            ///
            /// # Safety
            /// The result must stay inside the record the pointer was made from.
            #[inline]
            pub const unsafe fn byte_add(self, count: usize) -> Self {
                // SAFETY: the caller keeps the result inside the record.
                Self(unsafe { self.0.add(count) }, PhantomData)
            }
        }

        impl fmt::Debug for $ptr<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($ptr)).field(&self.0).finish()
            }
        }
    };
}

// -----------------------------------------------------------------------------
// Ptr

/// A shared pointer into a record whose type has been erased.
///
/// It borrows the record for `'a` like a `&'a R`, but does not know `R`.
/// Whoever reinterprets it (usually a field descriptor) must know which type
/// lives at the address.
///
/// # Examples
///
/// ```
/// # use fm_ptr::Ptr;
/// #[repr(C)]
/// struct Point { x: i32, y: i32 }
///
/// let p = Point { x: 1, y: 7 };
/// let record = Ptr::from_ref(&p);
///
/// let y = unsafe { record.byte_add(core::mem::offset_of!(Point, y)) };
/// y.debug_assert_aligned::<i32>();
/// assert_eq!(unsafe { *y.as_ref::<i32>() }, 7);
/// ```
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct Ptr<'a>(NonNull<u8>, PhantomData<&'a u8>);

impl_record_ptr!(Ptr);

impl<'a> Ptr<'a> {
    /// Erases the type of a borrowed record.
    #[inline(always)]
    pub const fn from_ref<T: ?Sized>(record: &'a T) -> Ptr<'a> {
        Ptr(NonNull::from_ref(record).cast(), PhantomData)
    }

    #[inline(always)]
    pub const fn as_ptr(self) -> *const u8 {
        self.0.as_ptr()
    }

    /// Reads the pointee as a `&'a T`.
    ///
    /// # Safety
    /// A valid, aligned `T` must live at the address.
    #[inline(always)]
    pub const unsafe fn as_ref<T>(self) -> &'a T {
        // SAFETY: see function docs.
        unsafe { &*self.0.as_ptr().cast::<T>() }
    }

    /// Clones the pointee out as a `T`.
    ///
    /// # Safety
    /// Same as [`as_ref`](Self::as_ref).
    #[inline]
    pub unsafe fn read_cloned<T: Clone>(self) -> T {
        // SAFETY: see function docs.
        unsafe { self.as_ref::<T>() }.clone()
    }
}

// -----------------------------------------------------------------------------
// PtrMut

/// An exclusive pointer into a record whose type has been erased.
///
/// The mutable counterpart of [`Ptr`]. It is not `Copy`: each field access
/// consumes it.
///
/// # Examples
///
/// ```
/// # use fm_ptr::PtrMut;
/// #[repr(C)]
/// struct Counter { hits: u64, name: String }
///
/// let mut c = Counter { hits: 1, name: "a".into() };
/// let record = PtrMut::from_mut(&mut c);
///
/// let mut name = unsafe { record.byte_add(core::mem::offset_of!(Counter, name)) };
/// let old = unsafe { name.replace::<String>("b".into()) };
///
/// assert_eq!(old, "a");
/// assert_eq!(c.name, "b");
/// ```
#[repr(transparent)]
pub struct PtrMut<'a>(NonNull<u8>, PhantomData<&'a mut u8>);

impl_record_ptr!(PtrMut);

impl<'a> PtrMut<'a> {
    /// Erases the type of a mutably borrowed record.
    #[inline(always)]
    pub const fn from_mut<T: ?Sized>(record: &'a mut T) -> PtrMut<'a> {
        PtrMut(NonNull::from_mut(record).cast(), PhantomData)
    }

    #[inline(always)]
    pub const fn as_ptr(&self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// Turns the pointer into a `&'a mut T`.
    ///
    /// # Safety
    /// A valid, aligned `T` must live at the address.
    #[inline(always)]
    pub const unsafe fn consume<T>(self) -> &'a mut T {
        // SAFETY: see function docs.
        unsafe { &mut *self.0.as_ptr().cast::<T>() }
    }

    /// Stores `value` in the pointee and returns the previous value.
    ///
    /// # Safety
    /// A valid, aligned `T` must live at the address.
    #[inline]
    pub unsafe fn replace<T>(&mut self, value: T) -> T {
        // SAFETY: see function docs.
        let slot = unsafe { &mut *self.0.as_ptr().cast::<T>() };
        core::mem::replace(slot, value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Ptr, PtrMut};
    use alloc::format;
    use core::mem::offset_of;

    #[repr(C)]
    struct Sample {
        flag: bool,
        count: u32,
        ratio: f64,
    }

    #[test]
    fn offset_read() {
        let s = Sample {
            flag: true,
            count: 42,
            ratio: 0.5,
        };
        let record = Ptr::from_ref(&s);

        let count = unsafe { record.byte_add(offset_of!(Sample, count)) };
        assert!(count.is_aligned::<u32>());
        assert_eq!(unsafe { count.read_cloned::<u32>() }, 42);

        let flag = unsafe { record.byte_add(offset_of!(Sample, flag)) };
        assert!(unsafe { *flag.as_ref::<bool>() });
        assert_eq!(s.ratio, 0.5);
    }

    #[test]
    fn offset_write() {
        let mut s = Sample {
            flag: false,
            count: 0,
            ratio: 1.0,
        };

        let mut ratio = unsafe { PtrMut::from_mut(&mut s).byte_add(offset_of!(Sample, ratio)) };
        let old = unsafe { ratio.replace::<f64>(2.5) };
        assert_eq!(old, 1.0);

        let count = unsafe { PtrMut::from_mut(&mut s).byte_add(offset_of!(Sample, count)) };
        unsafe { *count.consume::<u32>() = 9 };

        assert_eq!(s.ratio, 2.5);
        assert_eq!(s.count, 9);
        assert!(!s.flag);
    }

    #[test]
    fn debug_names_the_pointer() {
        let x = 3u16;
        let p = Ptr::from_ref(&x);
        assert!(format!("{p:?}").starts_with("Ptr("));
        assert_eq!(p.as_ptr(), (&raw const x).cast::<u8>());
    }
}
