//! Debug descriptions for values handed to [`Logger::inspect`](crate::Logger::inspect)

/// A value that can describe itself for debug records
pub trait Debuggable {
    /// Short, single-line description
    fn debug_description(&self) -> String;

    /// Longer description; defaults to the short one
    fn long_description(&self) -> String {
        self.debug_description()
    }
}

impl Debuggable for str {
    fn debug_description(&self) -> String {
        self.to_string()
    }

    fn long_description(&self) -> String {
        format!("{:?}", self)
    }
}

impl Debuggable for String {
    fn debug_description(&self) -> String {
        self.as_str().debug_description()
    }

    fn long_description(&self) -> String {
        self.as_str().long_description()
    }
}

impl<T: Debuggable + ?Sized> Debuggable for &T {
    fn debug_description(&self) -> String {
        (**self).debug_description()
    }

    fn long_description(&self) -> String {
        (**self).long_description()
    }
}

macro_rules! debuggable_via_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Debuggable for $ty {
                fn debug_description(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

debuggable_via_display!(bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl<T: Debuggable> Debuggable for Option<T> {
    fn debug_description(&self) -> String {
        match self {
            Some(value) => value.debug_description(),
            None => "Nil".to_string(),
        }
    }

    fn long_description(&self) -> String {
        match self {
            Some(value) => value.long_description(),
            None => "Nil".to_string(),
        }
    }
}

impl<T: Debuggable> Debuggable for [T] {
    fn debug_description(&self) -> String {
        format!("{} items", self.len())
    }

    fn long_description(&self) -> String {
        let items: Vec<String> = self.iter().map(|v| v.debug_description()).collect();
        format!("[{}]", items.join(", "))
    }
}

impl<T: Debuggable> Debuggable for Vec<T> {
    fn debug_description(&self) -> String {
        self.as_slice().debug_description()
    }

    fn long_description(&self) -> String {
        self.as_slice().long_description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Job {
        id: u32,
    }

    impl Debuggable for Job {
        fn debug_description(&self) -> String {
            format!("Job #{}", self.id)
        }
    }

    #[test]
    fn test_scalars() {
        assert_eq!(42u32.debug_description(), "42");
        assert_eq!(true.long_description(), "true");
        assert_eq!(1.5f64.debug_description(), "1.5");
    }

    #[test]
    fn test_strings_quote_in_long_form() {
        assert_eq!("hi".debug_description(), "hi");
        assert_eq!(String::from("hi").long_description(), "\"hi\"");
    }

    #[test]
    fn test_option_none_is_nil() {
        let missing: Option<u8> = None;
        assert_eq!(missing.debug_description(), "Nil");
        assert_eq!(Some(7u8).long_description(), "7");
    }

    #[test]
    fn test_collections() {
        let jobs = vec![Job { id: 1 }, Job { id: 2 }];
        assert_eq!(jobs.debug_description(), "2 items");
        assert_eq!(jobs.long_description(), "[Job #1, Job #2]");
    }
}
