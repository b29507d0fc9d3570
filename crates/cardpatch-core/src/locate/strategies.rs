use memchr::memmem;

use super::{Locate, LocateOptions, Strategy};
use crate::container::Entry;

/// Entry payload equals the needle byte for byte
#[derive(Debug, Clone, Copy)]
pub struct ExactMatch<'a> {
    needle: &'a [u8],
}

impl<'a> ExactMatch<'a> {
    pub fn new(needle: &'a [u8]) -> Self {
        Self { needle }
    }
}

impl Locate for ExactMatch<'_> {
    fn strategy(&self) -> Strategy {
        Strategy::Exact
    }

    fn whole_entry(&self) -> bool {
        true
    }

    fn match_entry(&self, entry: &Entry) -> Option<(usize, usize)> {
        (entry.data == self.needle).then_some((0, entry.data.len()))
    }
}

/// Entry payload is close in size to the needle and shares its prefix
#[derive(Debug, Clone, Copy)]
pub struct SizeTolerant<'a> {
    needle: &'a [u8],
    tolerance_percent: u32,
    prefix_len: usize,
}

impl<'a> SizeTolerant<'a> {
    pub fn new(needle: &'a [u8], options: &LocateOptions) -> Self {
        Self {
            needle,
            tolerance_percent: options.tolerance_percent,
            prefix_len: options.prefix_len,
        }
    }

    fn within_tolerance(&self, len: usize) -> bool {
        let expected = self.needle.len() as u128;
        let diff = (len as u128).abs_diff(expected);
        diff * 100 <= expected * self.tolerance_percent as u128
    }
}

impl Locate for SizeTolerant<'_> {
    fn strategy(&self) -> Strategy {
        Strategy::SizeTolerant
    }

    fn whole_entry(&self) -> bool {
        true
    }

    fn match_entry(&self, entry: &Entry) -> Option<(usize, usize)> {
        let data = &entry.data;
        if !self.within_tolerance(data.len()) {
            return None;
        }
        let prefix = self.prefix_len.min(self.needle.len());
        (data.get(..prefix)? == &self.needle[..prefix]).then_some((0, data.len()))
    }
}

/// Needle occurs as a contiguous subsequence of the entry payload
#[derive(Clone)]
pub struct Embedded<'a> {
    finder: memmem::Finder<'a>,
}

impl<'a> Embedded<'a> {
    pub fn new(needle: &'a [u8]) -> Self {
        Self {
            finder: memmem::Finder::new(needle),
        }
    }
}

impl Locate for Embedded<'_> {
    fn strategy(&self) -> Strategy {
        Strategy::Embedded
    }

    fn whole_entry(&self) -> bool {
        false
    }

    fn match_entry(&self, entry: &Entry) -> Option<(usize, usize)> {
        let offset = self.finder.find(&entry.data)?;
        Some((offset, self.finder.needle().len()))
    }
}
