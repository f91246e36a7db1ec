use super::Page;

/// Breadcrumb trail of the pages a session walked through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagePath {
    pages: Vec<Page>,
}

/// One rendered breadcrumb.
#[derive(Debug, Clone, PartialEq)]
pub struct Crumb {
    pub title: String,
    pub url: String,
}

impl PagePath {
    /// Record that the user left `from` for a deeper page.
    pub fn forward(&mut self, from: Page) {
        if self.pages.last() != Some(&from) {
            self.pages.push(from);
        }
    }

    /// Return to `page`, dropping it and everything visited after it. An
    /// unknown page clears the trail.
    pub fn back_to(&mut self, page: &Page) {
        match self.pages.iter().rposition(|p| p == page) {
            Some(pos) => self.pages.truncate(pos),
            None => self.pages.clear(),
        }
    }

    /// The page one level up.
    pub fn parent(&self) -> Option<&Page> {
        self.pages.last()
    }

    /// Record a move from `from` to `to`. Going back to a page already on the
    /// trail truncates it; the summary is the root of every trail.
    pub fn navigate(&mut self, from: Page, to: &Page) {
        if *to == Page::FsSummary {
            self.clear();
        } else if self.pages.contains(to) {
            self.back_to(to);
        } else if from != *to {
            self.forward(from);
        }
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub fn crumbs(&self) -> Vec<Crumb> {
        self.pages
            .iter()
            .map(|p| Crumb {
                title: p.title(),
                url: p.url(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_and_back() {
        let mut path = PagePath::default();
        path.forward(Page::FsSummary);
        path.forward(Page::FsDetails("samfs1".into()));
        path.forward(Page::FsDetails("samfs1".into()));
        assert_eq!(path.crumbs().len(), 2);
        assert_eq!(path.parent(), Some(&Page::FsDetails("samfs1".into())));

        path.back_to(&Page::FsSummary);
        assert_eq!(path.parent(), None);
    }

    #[test]
    fn test_navigate() {
        let mut path = PagePath::default();
        path.navigate(Page::FsSummary, &Page::FsDetails("qfs1".into()));
        path.navigate(
            Page::FsDetails("qfs1".into()),
            &Page::MountOptions("qfs1".into()),
        );
        assert_eq!(path.crumbs().len(), 2);

        // Redisplaying the same page leaves the trail alone.
        path.navigate(
            Page::MountOptions("qfs1".into()),
            &Page::MountOptions("qfs1".into()),
        );
        assert_eq!(path.crumbs().len(), 2);

        path.navigate(
            Page::MountOptions("qfs1".into()),
            &Page::FsDetails("qfs1".into()),
        );
        assert_eq!(path.parent(), Some(&Page::FsSummary));

        path.navigate(Page::FsDetails("qfs1".into()), &Page::FsSummary);
        assert!(path.crumbs().is_empty());
    }

    #[test]
    fn test_back_to_unknown_clears() {
        let mut path = PagePath::default();
        path.forward(Page::FsSummary);
        path.back_to(&Page::FileBrowser);
        assert!(path.crumbs().is_empty());
    }
}
