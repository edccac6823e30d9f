// Thu Jan 16 2026 - Alex

use crate::memory::Address;

/// A plain function pointer type that can be rebuilt from a raw address.
///
/// # Safety
///
/// Implementors must be pointer-sized function pointers.
pub unsafe trait FunctionPtr: Copy + Send + Sync + 'static {
    fn address(self) -> Address;

    /// # Safety
    ///
    /// `address` must point at code that follows this pointer's ABI and signature.
    unsafe fn from_address(address: Address) -> Self;
}

macro_rules! impl_function_ptr {
    ([$($abi:tt)*] $($arg:ident),*) => {
        unsafe impl<R: 'static, $($arg: 'static),*> FunctionPtr for $($abi)* fn($($arg),*) -> R {
            fn address(self) -> Address {
                Address::new(self as usize as u64)
            }

            unsafe fn from_address(address: Address) -> Self {
                unsafe { std::mem::transmute::<usize, Self>(address.as_usize()) }
            }
        }
    };
    (@arities [$($abi:tt)*]) => {
        impl_function_ptr!([$($abi)*]);
        impl_function_ptr!([$($abi)*] A);
        impl_function_ptr!([$($abi)*] A, B);
        impl_function_ptr!([$($abi)*] A, B, C);
        impl_function_ptr!([$($abi)*] A, B, C, D);
        impl_function_ptr!([$($abi)*] A, B, C, D, E);
        impl_function_ptr!([$($abi)*] A, B, C, D, E, F);
    };
}

impl_function_ptr!(@arities [extern "C"]);

#[cfg(target_arch = "x86")]
impl_function_ptr!(@arities [extern "stdcall"]);
#[cfg(target_arch = "x86")]
impl_function_ptr!(@arities [extern "fastcall"]);
#[cfg(target_arch = "x86")]
impl_function_ptr!(@arities [extern "thiscall"]);
