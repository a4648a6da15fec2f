#[derive(Default)]
pub struct OutputBuilder {
    indent: usize,
    header: Option<String>,
    properties: Vec<(String, String)>,
    children: Vec<String>,
}

impl OutputBuilder {
    pub fn new<H: ToString>(header: H) -> Self {
        Self {
            header: Some(header.to_string()),
            ..Default::default()
        }
    }

    pub fn build(self) -> String {
        let OutputBuilder {
            indent,
            header,
            properties,
            children,
        } = self;

        let mut output = String::new();
        let width = properties.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

        if let Some(header) = header {
            output.push_str(&format!("{:indent$}● {header}\n", ""));
        }

        for (key, value) in properties.iter() {
            output.push_str(&format!(
                "{:indent$}{key:>width$}: {value}\n",
                "",
                indent = indent + 4
            ));
        }

        for child in children {
            output.push_str(&child);
        }

        output
    }

    pub fn property<K: ToString, V: ToString>(&mut self, key: K, value: V) {
        self.properties.push((key.to_string(), value.to_string()));
    }

    pub fn section<H: Into<String>>(
        &mut self,
        header: H,
        builder: impl FnOnce(&mut OutputBuilder),
    ) {
        let mut section_builder = OutputBuilder {
            indent: self.indent + 2,
            header: Some(header.into()),
            properties: vec![],
            children: vec![],
        };

        (builder)(&mut section_builder);

        self.children.push(section_builder.build());
    }
}

#[cfg(test)]
mod test {
    use expect_test::expect;

    use super::OutputBuilder;

    #[test]
    fn aligns_keys_and_nests_sections() {
        let mut output = OutputBuilder::new("Settings");
        output.property("Strategy", "auto");
        output.property("Poll interval", "1ms");
        output.section("Descriptor paths", |builder| {
            builder.property("Status", "Found");
        });

        expect![[r#"
            ● Settings
                     Strategy: auto
                Poll interval: 1ms
              ● Descriptor paths
                  Status: Found
        "#]]
        .assert_eq(&output.build());
    }
}
