pub const POSTS_PER_PAGE: u64 = 10;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageRequest(u64);

impl PageRequest {
    pub const FIRST: Self = Self(1);
    pub const LAST: Self = Self(u64::MAX);

    /// Reads the `page` query parameter: missing or garbage means the first page, `last`
    /// means the last page.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::FIRST;
        };

        if raw == "last" {
            return Self::LAST;
        }

        match raw.parse::<i64>() {
            Ok(number) if number >= 1 => Self(number.cast_unsigned()),
            Ok(_) => Self::FIRST,
            Err(_) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => Self::LAST,
            Err(_) => Self::FIRST,
        }
    }

    #[must_use]
    pub fn number(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn window(self, total: u64, per_page: u64) -> PageWindow {
        let per_page = per_page.max(1);
        let num_pages = total.div_ceil(per_page).max(1);
        let number = self.0.clamp(1, num_pages);

        PageWindow {
            number,
            num_pages,
            total,
            offset: (number - 1) * per_page,
            limit: per_page,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::FIRST
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl PageWindow {
    #[must_use]
    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        debug_assert!(items.len() as u64 <= self.limit);

        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    #[must_use]
    pub fn previous_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }

    #[must_use]
    pub fn next_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::page::{POSTS_PER_PAGE, PageRequest, PageWindow};

    #[test]
    fn parse_page_numbers() {
        assert_eq!(PageRequest::parse(None), PageRequest::FIRST);
        assert_eq!(PageRequest::parse(Some("")), PageRequest::FIRST);
        assert_eq!(PageRequest::parse(Some("abc")), PageRequest::FIRST);
        assert_eq!(PageRequest::parse(Some("0")), PageRequest::FIRST);
        assert_eq!(PageRequest::parse(Some("-4")), PageRequest::FIRST);
        assert_eq!(PageRequest::parse(Some("3")).number(), 3);
        assert_eq!(PageRequest::parse(Some(" 2 ")).number(), 2);
        assert_eq!(PageRequest::parse(Some("last")), PageRequest::LAST);
        assert_eq!(
            PageRequest::parse(Some("99999999999999999999999")),
            PageRequest::LAST
        );
    }

    #[test]
    fn windows_clamp_to_existing_pages() {
        assert_eq!(
            PageRequest::parse(Some("2")).window(13, POSTS_PER_PAGE),
            PageWindow {
                number: 2,
                num_pages: 2,
                total: 13,
                offset: 10,
                limit: 10,
            }
        );
        assert_eq!(PageRequest::parse(Some("7")).window(13, 10).number, 2);
        assert_eq!(PageRequest::LAST.window(30, 10).number, 3);
        assert_eq!(PageRequest::LAST.window(30, 10).offset, 20);
        assert_eq!(PageRequest::FIRST.window(13, 10).offset, 0);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let window = PageRequest::parse(Some("5")).window(0, POSTS_PER_PAGE);
        let page = window.into_page::<u8>(Vec::new());

        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(page.is_empty());
        assert!(!page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn neighbours() {
        let page = PageRequest::parse(Some("2"))
            .window(25, 10)
            .into_page(vec![(); 10]);

        assert_eq!(page.previous_number(), Some(1));
        assert_eq!(page.next_number(), Some(3));

        let last = PageRequest::LAST.window(25, 10).into_page(vec![(); 5]);
        assert_eq!(last.next_number(), None);
        assert_eq!(last.map(|()| 1).items.len(), 5);
    }
}
