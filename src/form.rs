use crate::catalog::{Catalog, DocumentType};
use crate::error::Result;
use std::collections::HashMap;
use std::io::{BufRead, Write};

/// Answers for one completed form, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionValues {
    values: HashMap<String, String>,
}

impl SubmissionValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// The value entered for `name`, or `""` when the field was never filled.
    pub fn value_for(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubmissionValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A surface that presents one input per field, in catalog order, and hands
/// back what the user typed. Inputs are taken as free text whatever their kind.
pub trait FormCollector {
    fn collect(&mut self, document: &DocumentType) -> Result<SubmissionValues>;
}

/// Prompts on a line-oriented terminal.
pub struct TerminalCollector<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalCollector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    pub fn say(&mut self, message: impl std::fmt::Display) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }

    /// Shows `prompt` and reads the reply, trimmed. `None` at end of input.
    pub fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        Ok(self.read_line()?.map(|line| line.trim().to_string()))
    }

    /// Returns `None` once the input is exhausted.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Lists the catalog and reads a 1-based selection. Blank or invalid
    /// input re-prompts; end of input yields `None`.
    pub fn choose_document_type<'c>(
        &mut self,
        catalog: &'c Catalog,
    ) -> Result<Option<&'c DocumentType>> {
        let types = catalog.document_types();
        if types.is_empty() {
            writeln!(self.output, "The catalog has no document types.")?;
            return Ok(None);
        }

        loop {
            writeln!(self.output, "Select a document type:")?;
            for (i, doc) in types.iter().enumerate() {
                writeln!(self.output, "  {}. {}", i + 1, doc.title)?;
            }
            write!(self.output, "> ")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            match line.trim().parse::<usize>() {
                Ok(n) if (1..=types.len()).contains(&n) => return Ok(Some(&types[n - 1])),
                _ => writeln!(self.output, "Please enter a number between 1 and {}.", types.len())?,
            }
        }
    }
}

impl<R: BufRead, W: Write> FormCollector for TerminalCollector<R, W> {
    fn collect(&mut self, document: &DocumentType) -> Result<SubmissionValues> {
        writeln!(self.output, "\n{} Form", document.title)?;
        let mut values = SubmissionValues::new();
        for field in &document.fields {
            write!(self.output, "{} ({}): ", field.label, field.kind.prompt_hint())?;
            self.output.flush()?;
            match self.read_line()? {
                Some(line) => values.insert(field.name.clone(), line.trim()),
                // Remaining fields stay missing and render empty.
                None => break,
            }
        }
        Ok(values)
    }
}
