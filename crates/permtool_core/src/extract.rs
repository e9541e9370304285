//! Top-level tag-block scanning over raw document text.
//!
//! This is deliberately not an XML parser: blocks are the shortest span
//! between an opening `<tag>` and the next `</tag>`, scanned left to
//! right without overlap. Nested same-named tags are not supported and
//! attributes, CDATA and namespaces are not understood. Salesforce
//! profile and permission-set exports are flat, which is the only input
//! this matcher is contracted for; swapping in a real parser behind the
//! same block sequence would not change downstream consumers.

/// One extracted `<tag>...</tag>` occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// The whole block including the enclosing tags.
    pub raw: &'a str,
    /// The text between the tags, untrimmed.
    pub inner: &'a str,
}

/// Lazy iterator over the blocks of one tag name. Restartable by
/// constructing a fresh iterator; unterminated trailing opens yield
/// nothing.
#[derive(Debug)]
pub struct TagBlocks<'a> {
    text: &'a str,
    open: String,
    close: String,
    pos: usize,
}

pub fn tag_blocks<'a>(text: &'a str, tag: &str) -> TagBlocks<'a> {
    TagBlocks {
        text,
        open: format!("<{tag}>"),
        close: format!("</{tag}>"),
        pos: 0,
    }
}

impl<'a> Iterator for TagBlocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Block<'a>> {
        let start = self.text.get(self.pos..)?.find(&self.open)? + self.pos;
        let inner_start = start + self.open.len();
        let inner_end = self.text[inner_start..].find(&self.close)? + inner_start;
        let end = inner_end + self.close.len();
        self.pos = end;
        Some(Block {
            raw: &self.text[start..end],
            inner: &self.text[inner_start..inner_end],
        })
    }
}

/// Trimmed text content of the first `<sub_tag>...</sub_tag>` occurrence
/// inside a block's inner text, or `None` when the sub-element is absent.
pub fn tag_value<'a>(inner: &'a str, sub_tag: &str) -> Option<&'a str> {
    tag_blocks(inner, sub_tag)
        .next()
        .map(|block| block.inner.trim())
}

#[cfg(test)]
mod tests {
    use super::{tag_blocks, tag_value};

    #[test]
    fn finds_blocks_in_document_order() {
        let xml = "<userPermissions><name>A</name></userPermissions>\n\
                   <classAccesses><apexClass>X</apexClass></classAccesses>\n\
                   <userPermissions><name>B</name></userPermissions>";
        let inners: Vec<&str> = tag_blocks(xml, "userPermissions")
            .map(|block| block.inner)
            .collect();
        assert_eq!(inners, vec!["<name>A</name>", "<name>B</name>"]);
    }

    #[test]
    fn raw_includes_enclosing_tags() {
        let xml = "prefix <tab>Home</tab> suffix";
        let block = tag_blocks(xml, "tab").next().expect("block");
        assert_eq!(block.raw, "<tab>Home</tab>");
        assert_eq!(block.inner, "Home");
    }

    #[test]
    fn unterminated_open_yields_nothing() {
        let xml = "<userPermissions><name>A</name>";
        assert_eq!(tag_blocks(xml, "userPermissions").count(), 0);
    }

    #[test]
    fn blocks_do_not_overlap() {
        let xml = "<p>1</p><p>2</p><p>3</p>";
        let inners: Vec<&str> = tag_blocks(xml, "p").map(|block| block.inner).collect();
        assert_eq!(inners, vec!["1", "2", "3"]);
    }

    #[test]
    fn iterator_is_restartable() {
        let xml = "<p>1</p><p>2</p>";
        assert_eq!(tag_blocks(xml, "p").count(), 2);
        assert_eq!(tag_blocks(xml, "p").count(), 2);
    }

    #[test]
    fn tag_value_trims_and_handles_absence() {
        let inner = "\n    <name>  ViewAllData  </name>\n    <enabled>true</enabled>\n";
        assert_eq!(tag_value(inner, "name"), Some("ViewAllData"));
        assert_eq!(tag_value(inner, "enabled"), Some("true"));
        assert_eq!(tag_value(inner, "license"), None);
    }
}
