//! Site rules for the supported meme sources.

use memebot_core::Error;
use url::Url;

/// A category of a listing source with its highest valid page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: &'static str,
    pub max_page: u32,
}

/// How a source hands out memes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// One request returns one random item; the last container on the page holds it.
    RandomItem,
    /// Paginated listing; every container holding an image is a candidate.
    Listing { categories: Vec<Category> },
}

/// How to find candidates on a source's pages.
#[derive(Debug, Clone)]
pub struct SiteRule {
    /// Command name, e.g. `cuantarazon`.
    pub name: &'static str,
    /// Origin that relative image URLs are resolved against.
    pub base_url: Url,
    /// Page URL; listing templates contain `{category}` and `{page}`.
    pub url_template: &'static str,
    /// CSS selector of the element wrapping each meme.
    pub container_selector: &'static str,
    /// `<img>` attribute holding the caption.
    pub caption_attr: &'static str,
    pub kind: SourceKind,
    /// Whether downloaded images may be served from the content cache.
    pub cacheable: bool,
}

impl SiteRule {
    /// Random-item source.
    pub fn random_item(name: &'static str, base_url: &str, url_template: &'static str) -> Result<Self, Error> {
        Ok(Self {
            name,
            base_url: parse_base(base_url)?,
            url_template,
            container_selector: "div.storyContent",
            caption_attr: "title",
            kind: SourceKind::RandomItem,
            cacheable: false,
        })
    }

    /// The planetaneperiano listing with its three categories.
    pub fn planetaneperiano(base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            name: "planetaneperiano",
            base_url: parse_base(base_url)?,
            url_template: "/neperianadas/latest/{category}?page={page}",
            container_selector: "div.neperianadas",
            caption_attr: "alt",
            kind: SourceKind::Listing {
                categories: vec![
                    Category { name: "general", max_page: 950 },
                    Category { name: "gamer", max_page: 350 },
                    Category { name: "otaku", max_page: 1300 },
                ],
            },
            cacheable: true,
        })
    }

    /// All built-in sources against their production origins.
    pub fn builtin() -> Result<Vec<Self>, Error> {
        Ok(vec![
            Self::random_item("cuantarazon", "https://m.cuantarazon.com", "/aleatorio/")?,
            Self::random_item("cuantocabron", "https://m.cuantocabron.com", "/aleatorio")?,
            Self::planetaneperiano("https://www.planetaneperiano.com")?,
        ])
    }

    /// Look up a category of a listing source.
    pub fn category(&self, name: &str) -> Result<&Category, Error> {
        match &self.kind {
            SourceKind::Listing { categories } => categories
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| Error::InvalidInput(format!("unknown category for {}: {}", self.name, name))),
            SourceKind::RandomItem => Err(Error::InvalidInput(format!("{} has no categories", self.name))),
        }
    }

    /// Build the page URL for a request.
    ///
    /// `category` is required for listing sources and ignored otherwise.
    pub fn page_url(&self, category: Option<&str>, page: u32) -> Result<Url, Error> {
        let path = match &self.kind {
            SourceKind::RandomItem => self.url_template.to_string(),
            SourceKind::Listing { .. } => {
                let name = category
                    .ok_or_else(|| Error::InvalidInput(format!("{} requires a category", self.name)))?;
                let category = self.category(name)?;
                self.url_template
                    .replace("{category}", category.name)
                    .replace("{page}", &page.to_string())
            }
        };

        self.base_url
            .join(&path)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Resolve an image `src` against the source origin.
    pub fn resolve_image_url(&self, src: &str) -> Result<Url, Error> {
        self.base_url
            .join(src.trim())
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", src, e)))
    }
}

fn parse_base(base_url: &str) -> Result<Url, Error> {
    Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rules() {
        let rules = SiteRule::builtin().unwrap();
        let names: Vec<_> = rules.iter().map(|r| r.name).collect();
        assert_eq!(names, ["cuantarazon", "cuantocabron", "planetaneperiano"]);
        assert!(rules.iter().filter(|r| r.cacheable).all(|r| r.name == "planetaneperiano"));
    }

    #[test]
    fn test_random_item_page_url() {
        let rule = SiteRule::random_item("cuantarazon", "https://m.cuantarazon.com", "/aleatorio/").unwrap();
        let url = rule.page_url(None, 1).unwrap();
        assert_eq!(url.as_str(), "https://m.cuantarazon.com/aleatorio/");
    }

    #[test]
    fn test_listing_page_url() {
        let rule = SiteRule::planetaneperiano("https://www.planetaneperiano.com").unwrap();
        let url = rule.page_url(Some("otaku"), 42).unwrap();
        assert_eq!(url.as_str(), "https://www.planetaneperiano.com/neperianadas/latest/otaku?page=42");
    }

    #[test]
    fn test_listing_requires_known_category() {
        let rule = SiteRule::planetaneperiano("https://www.planetaneperiano.com").unwrap();
        assert!(matches!(rule.page_url(None, 1), Err(Error::InvalidInput(_))));
        assert!(matches!(rule.page_url(Some("memes"), 1), Err(Error::InvalidInput(_))));
        assert_eq!(rule.category("gamer").unwrap().max_page, 350);
    }

    #[test]
    fn test_resolve_image_url() {
        let rule = SiteRule::planetaneperiano("https://www.planetaneperiano.com").unwrap();
        assert_eq!(
            rule.resolve_image_url("/images/n/123.jpg").unwrap().as_str(),
            "https://www.planetaneperiano.com/images/n/123.jpg"
        );
        assert_eq!(
            rule.resolve_image_url("https://cdn.example.com/a.png").unwrap().as_str(),
            "https://cdn.example.com/a.png"
        );
    }
}
