//! Segment builder
//!
//! Accumulates documents into per-field position-annotated postings and
//! emits a serializable `SegmentPayload`. A commit builds the next
//! generation by carrying over surviving documents from the committed
//! segment (postings are remapped, not re-tokenized) and then adding the
//! staged documents.

use std::collections::BTreeMap;
use std::io;

use crate::document::Document;
use crate::schema::Schema;
use crate::tokenizer::Tokenizer;

use super::postings::PostingsWriter;
use super::reader::{FieldPayload, Segment, SegmentPayload};
use super::term_dict::TermDictionaryBuilder;
use super::types::{DocNo, Posting, SegmentMeta};

struct FieldAccumulator {
    postings: BTreeMap<String, Vec<Posting>>,
    doc_lengths: Vec<u32>,
}

impl FieldAccumulator {
    fn new() -> Self {
        Self {
            postings: BTreeMap::new(),
            doc_lengths: Vec::new(),
        }
    }
}

/// Builds one segment from carried-over and freshly staged documents
pub struct SegmentBuilder<'a> {
    schema: &'a Schema,
    tokenizer: &'a Tokenizer,
    docs: Vec<Document>,
    fields: BTreeMap<String, FieldAccumulator>,
}

impl<'a> SegmentBuilder<'a> {
    pub fn new(schema: &'a Schema, tokenizer: &'a Tokenizer) -> Self {
        let mut fields = BTreeMap::new();
        for field in schema.indexed_fields() {
            fields.insert(field.name.clone(), FieldAccumulator::new());
        }
        Self {
            schema,
            tokenizer,
            docs: Vec::new(),
            fields,
        }
    }

    /// Carry over documents from a committed segment, keeping postings intact
    ///
    /// Documents failing the `keep` predicate drop out together with their
    /// postings; survivors are renumbered densely in their original order.
    /// Must run before any `add_document` call so carried docnos stay below
    /// staged ones.
    pub fn carry_over<F>(&mut self, segment: &Segment, keep: F) -> io::Result<()>
    where
        F: Fn(&Document) -> bool,
    {
        debug_assert!(self.docs.is_empty(), "carry_over must precede staging");

        let mut remap: Vec<Option<DocNo>> = Vec::with_capacity(segment.doc_count() as usize);
        for (old_index, doc) in segment.docs().iter().enumerate() {
            if keep(doc) {
                let old_docno = DocNo(old_index as u32);
                let new_docno = DocNo(self.docs.len() as u32);
                remap.push(Some(new_docno));
                for (name, acc) in self.fields.iter_mut() {
                    let length = segment
                        .field(name)
                        .map(|f| f.doc_length(old_docno))
                        .unwrap_or(0);
                    acc.doc_lengths.push(length);
                }
                self.docs.push(doc.clone());
            } else {
                remap.push(None);
            }
        }

        for (name, acc) in self.fields.iter_mut() {
            let reader = match segment.field(name) {
                Some(reader) => reader,
                None => continue,
            };
            for (term, meta) in reader.terms().iter_terms() {
                let postings = reader.decode_postings(meta)?;
                for posting in postings {
                    if let Some(Some(new_docno)) = remap.get(posting.docno.as_usize()) {
                        acc.postings
                            .entry(term.clone())
                            .or_default()
                            .push(Posting::new(*new_docno, posting.positions));
                    }
                }
            }
        }

        Ok(())
    }

    /// Tokenize and stage a new document, returning its docno
    pub fn add_document(&mut self, doc: Document) -> DocNo {
        let docno = DocNo(self.docs.len() as u32);

        for field in self.schema.indexed_fields() {
            let acc = self
                .fields
                .get_mut(&field.name)
                .expect("accumulator exists for every indexed field");

            let text = doc.field_text(&field.name).unwrap_or("");
            let tokens = self.tokenizer.tokenize_with_positions_ordered(text);
            acc.doc_lengths.push(tokens.len() as u32);

            let mut term_positions: BTreeMap<String, Vec<u32>> = BTreeMap::new();
            for (term, position) in tokens {
                term_positions.entry(term).or_default().push(position);
            }
            for (term, positions) in term_positions {
                acc.postings
                    .entry(term)
                    .or_default()
                    .push(Posting::new(docno, positions));
            }
        }

        self.docs.push(doc);
        docno
    }

    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    /// Emit the finished segment payload for the given generation
    pub fn build(self, generation: u64, created_at: i64) -> io::Result<SegmentPayload> {
        let mut fields = BTreeMap::new();

        for (name, acc) in self.fields {
            let mut postings_writer = PostingsWriter::new();
            let mut dict_builder = TermDictionaryBuilder::new();

            for (term, postings) in &acc.postings {
                postings_writer.start_posting_list();
                let mut total_term_frequency = 0u64;
                for posting in postings {
                    postings_writer.add_posting(posting);
                    total_term_frequency += posting.term_frequency() as u64;
                }
                let meta = postings_writer
                    .finish_posting_list(postings.len() as u32, total_term_frequency);
                dict_builder.add(term, meta)?;
            }

            let dict = dict_builder.build()?;
            fields.insert(
                name,
                FieldPayload {
                    fst: dict.fst_bytes().to_vec(),
                    term_meta: dict.metadata().to_vec(),
                    postings: postings_writer.into_data(),
                    doc_lengths: acc.doc_lengths,
                },
            );
        }

        Ok(SegmentPayload {
            meta: SegmentMeta {
                generation,
                doc_count: self.docs.len() as u32,
                created_at,
            },
            docs: self.docs,
            fields,
        })
    }
}
