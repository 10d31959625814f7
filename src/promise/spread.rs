/// Call a function with the elements of `self` as positional arguments.
///
/// Implemented for tuples of up to six elements and arrays of up to four, so
/// that [Promise::spread](super::Promise::spread) can unpack an aggregate
/// value:
///
/// ```
/// use vow::Spread;
/// assert_eq!((2, 3).spread(|a: i32, b: i32| a * b), 6);
/// assert_eq!([1, 2, 3].spread(|a: i32, b: i32, c: i32| a + b + c), 6);
/// ```
pub trait Spread<F> {
    type Output;

    fn spread(self, f: F) -> Self::Output;
}

macro_rules! spread_tuple {
    ($($arg:ident),*) => {
        impl<Func, Out, $($arg,)*> Spread<Func> for ($($arg,)*)
        where
            Func: FnOnce($($arg),*) -> Out,
        {
            type Output = Out;

            #[allow(non_snake_case)]
            fn spread(self, f: Func) -> Out {
                let ($($arg,)*) = self;
                f($($arg),*)
            }
        }
    };
}

spread_tuple!();
spread_tuple!(A);
spread_tuple!(A, B);
spread_tuple!(A, B, C);
spread_tuple!(A, B, C, D);
spread_tuple!(A, B, C, D, E);
spread_tuple!(A, B, C, D, E, G);

macro_rules! spread_array {
    (@elem $arg:ident $t:ident) => { $t };
    ($len:literal: $($arg:ident),+) => {
        impl<Func, Out, T> Spread<Func> for [T; $len]
        where
            Func: FnOnce($(spread_array!(@elem $arg T)),+) -> Out,
        {
            type Output = Out;

            fn spread(self, f: Func) -> Out {
                let [$($arg),+] = self;
                f($($arg),+)
            }
        }
    };
}

spread_array!(1: a);
spread_array!(2: a, b);
spread_array!(3: a, b, c);
spread_array!(4: a, b, c, d);
