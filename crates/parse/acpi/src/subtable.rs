//! Generic ACPI sub-table walking.
//!
//! Several ACPI tables (MADT, SRAT, ...) end in a run of variable-length
//! entries, each prefixed by a one-byte type and a one-byte length that
//! includes the prefix itself. Nothing tells the parser up front how many
//! entries there are; the only authority is each entry's own length field,
//! which is firmware-controlled and therefore untrusted.
//!
//! [`validate`] is the single bounds check every decoder goes through
//! before touching a field past the two-byte prefix. [`walk`] and
//! [`walk_array`] drive per-type handlers over the entries, counting the
//! ones a handler accepts and giving up at the first entry that does not
//! fit in the table.

use crate::AcpiError;

/// The `{type, length}` prefix shared by every sub-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtableHeader {
    /// Entry type tag.
    pub entry_type: u8,
    /// Entry length in bytes, including this header.
    pub length: u8,
}

impl SubtableHeader {
    /// Size of the prefix in bytes.
    pub const SIZE: usize = 2;
}

/// Returns `true` if an entry declaring `declared_len` bytes holds at least
/// `min_size` bytes and fits in the `remaining` bytes left in the table.
#[must_use]
pub const fn entry_fits(declared_len: usize, min_size: usize, remaining: usize) -> bool {
    declared_len >= min_size && declared_len <= remaining
}

/// Decides whether `entry` is safe to read as a structure of `min_size`
/// bytes in a table ending at byte offset `table_end`.
///
/// Fails for a missing entry, for a declared length shorter than
/// `min_size`, and for an entry whose declared length runs past
/// `table_end`.
#[must_use]
pub fn validate(entry: Option<&Subtable<'_>>, min_size: usize, table_end: usize) -> bool {
    let Some(entry) = entry else {
        return false;
    };
    match table_end.checked_sub(entry.offset) {
        Some(remaining) => entry_fits(entry.length(), min_size, remaining),
        None => false,
    }
}

/// One entry of a sub-table run, positioned inside its table.
#[derive(Debug, Clone, Copy)]
pub struct Subtable<'a> {
    header: SubtableHeader,
    offset: usize,
    table: &'a [u8],
}

impl<'a> Subtable<'a> {
    /// The entry's `{type, length}` prefix.
    #[must_use]
    pub fn header(&self) -> SubtableHeader {
        self.header
    }

    /// The entry type tag.
    #[must_use]
    pub fn entry_type(&self) -> u8 {
        self.header.entry_type
    }

    /// Declared length of the entry, prefix included.
    #[must_use]
    pub fn length(&self) -> usize {
        usize::from(self.header.length)
    }

    /// Byte offset of the entry from the start of the table.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte offset one past the last byte of the table.
    #[must_use]
    pub fn table_end(&self) -> usize {
        self.table.len()
    }

    /// Returns the entry's bytes, prefix included, after checking that the
    /// entry is at least `min_size` bytes long and lies inside the table.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the bounds check fails. No
    /// byte of the entry beyond its prefix has been read at that point.
    pub fn body(&self, min_size: usize) -> Result<&'a [u8], AcpiError> {
        if !validate(Some(self), min_size, self.table_end()) {
            return Err(self.malformed());
        }
        Ok(&self.table[self.offset..self.offset + self.length()])
    }

    /// The error describing this entry as malformed.
    #[must_use]
    pub fn malformed(&self) -> AcpiError {
        AcpiError::MalformedEntry {
            entry_type: self.header.entry_type,
            offset: self.offset,
        }
    }
}

/// Iterator over the entries of a sub-table run.
///
/// Yields entries in offset order. An entry whose length is shorter than
/// its own prefix or runs past the end of the table is yielded once as an
/// error, after which the iterator is exhausted: nothing beyond a corrupt
/// length field can be located reliably. Fewer than two trailing bytes are
/// treated as padding and end the iteration quietly.
#[derive(Debug, Clone)]
pub struct SubtableIter<'a> {
    table: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> SubtableIter<'a> {
    /// Iterates the entries of `table` starting at byte offset `start`.
    #[must_use]
    pub fn new(table: &'a [u8], start: usize) -> Self {
        Self {
            table,
            offset: start,
            done: false,
        }
    }
}

impl<'a> Iterator for SubtableIter<'a> {
    type Item = Result<Subtable<'a>, AcpiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let prefix = self
            .table
            .get(self.offset..self.offset.checked_add(SubtableHeader::SIZE)?);
        let Some(&[entry_type, length]) = prefix else {
            self.done = true;
            return None;
        };

        let entry = Subtable {
            header: SubtableHeader { entry_type, length },
            offset: self.offset,
            table: self.table,
        };
        if !validate(Some(&entry), SubtableHeader::SIZE, self.table.len()) {
            self.done = true;
            return Some(Err(entry.malformed()));
        }

        self.offset += entry.length();
        Some(Ok(entry))
    }
}

/// Whether a handler accepted an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// The entry was registered and counts toward the walk's total.
    Counted,
    /// The entry was well-formed but deliberately ignored.
    Skipped,
}

/// A per-type entry handler. Receives the walk context and the entry.
pub type SubtableHandler<C> = fn(&mut C, &Subtable<'_>) -> Result<Visit, AcpiError>;

/// Pairs an entry type with its handler for [`walk_array`], and records
/// how many entries of that type the handler accepted.
pub struct SubtableProc<C> {
    /// Entry type this handler applies to.
    pub entry_type: u8,
    /// The handler.
    pub handler: SubtableHandler<C>,
    /// Entries accepted so far.
    pub count: usize,
}

impl<C> SubtableProc<C> {
    /// Creates a handler slot with a zero count.
    #[must_use]
    pub const fn new(entry_type: u8, handler: SubtableHandler<C>) -> Self {
        Self {
            entry_type,
            handler,
            count: 0,
        }
    }
}

/// What a walk accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Entries accepted across all handlers.
    pub count: usize,
    /// The walk stopped at its ceiling with an entry of a handled type
    /// still unvisited.
    pub capped: bool,
}

fn dispatches<C>(procs: &[SubtableProc<C>], entry: &Subtable<'_>) -> bool {
    procs.iter().any(|p| p.entry_type == entry.entry_type())
}

/// Walks the entries of `table` starting at `header_size`, dispatching
/// every entry whose type matches one of `procs` to that handler.
///
/// All handlers share one pass over the table, which is how sibling entry
/// types (for example legacy and x2APIC processors) are tallied together.
/// Each handler's own tally is left in its [`SubtableProc::count`], also
/// when the walk fails part way.
///
/// When `max_entries` is `Some(max)` the walk stops quietly once `max`
/// entries have been accepted. The remaining entries are neither handled
/// nor validated; [`WalkSummary::capped`] tells whether any of them was
/// of a handled type.
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] as soon as an entry's length is
/// inconsistent with the table or a handler rejects an entry. Entries
/// accepted before that point stay accepted.
pub fn walk_array<C>(
    table: &[u8],
    header_size: usize,
    procs: &mut [SubtableProc<C>],
    ctx: &mut C,
    max_entries: Option<usize>,
) -> Result<WalkSummary, AcpiError> {
    let mut summary = WalkSummary::default();
    let mut entries = SubtableIter::new(table, header_size);
    while let Some(entry) = entries.next() {
        if max_entries.is_some_and(|max| summary.count >= max) {
            summary.capped = core::iter::once(entry)
                .chain(&mut entries)
                .map_while(Result::ok)
                .any(|e| dispatches(procs, &e));
            break;
        }
        let entry = entry?;
        let Some(slot) = procs.iter_mut().find(|p| p.entry_type == entry.entry_type()) else {
            continue;
        };
        if (slot.handler)(ctx, &entry)? == Visit::Counted {
            slot.count += 1;
            summary.count += 1;
        }
    }
    Ok(summary)
}

/// Walks the entries of `table` of a single `entry_type`.
///
/// See [`walk_array`] for the counting, capacity and error rules.
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] on the first inconsistent entry
/// or handler failure.
pub fn walk<C>(
    table: &[u8],
    header_size: usize,
    entry_type: u8,
    handler: SubtableHandler<C>,
    ctx: &mut C,
    max_entries: Option<usize>,
) -> Result<WalkSummary, AcpiError> {
    let mut procs = [SubtableProc::new(entry_type, handler)];
    walk_array(table, header_size, &mut procs, ctx, max_entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Four bytes of fake table header followed by raw entries.
    fn table(entries: &[&[u8]]) -> Vec<u8> {
        let mut t = vec![0xEE; 4];
        for e in entries {
            t.extend_from_slice(e);
        }
        t
    }

    #[derive(Default)]
    struct Seen {
        offsets: Vec<usize>,
    }

    fn record(seen: &mut Seen, entry: &Subtable<'_>) -> Result<Visit, AcpiError> {
        entry.body(4)?;
        seen.offsets.push(entry.offset());
        Ok(Visit::Counted)
    }

    fn skip_odd(seen: &mut Seen, entry: &Subtable<'_>) -> Result<Visit, AcpiError> {
        let body = entry.body(3)?;
        if body[2] % 2 == 1 {
            return Ok(Visit::Skipped);
        }
        seen.offsets.push(entry.offset());
        Ok(Visit::Counted)
    }

    #[test]
    fn entry_fits_rules() {
        assert!(entry_fits(8, 8, 8));
        assert!(entry_fits(12, 8, 100));
        assert!(!entry_fits(7, 8, 100));
        assert!(!entry_fits(8, 8, 7));
        assert!(!entry_fits(0, 2, 10));
    }

    #[test]
    fn validate_rejects_missing_entry() {
        assert!(!validate(None, 0, 100));
    }

    #[test]
    fn validate_checks_length_and_end() {
        let t = table(&[&[1, 8, 0, 0, 0, 0, 0, 0]]);
        let entry = SubtableIter::new(&t, 4).next().unwrap().unwrap();
        assert!(validate(Some(&entry), 8, t.len()));
        assert!(!validate(Some(&entry), 9, t.len()));
        assert!(!validate(Some(&entry), 8, t.len() - 1));
        assert!(!validate(Some(&entry), 2, 3));
    }

    #[test]
    fn walk_visits_every_entry_in_order() {
        let t = table(&[&[0, 4, 0, 0], &[1, 6, 0, 0, 0, 0], &[0, 5, 0, 0, 0], &[0, 4, 0, 0]]);
        let mut seen = Seen::default();
        let n = walk(&t, 4, 0, record, &mut seen, None).unwrap();
        assert_eq!(n.count, 3);
        assert!(!n.capped);
        assert_eq!(seen.offsets, [4, 14, 19]);
    }

    #[test]
    fn walk_array_single_pass_tallies_per_type() {
        let t = table(&[&[0, 4, 0, 0], &[9, 4, 0, 0], &[0, 4, 0, 0], &[3, 4, 0, 0]]);
        let mut seen = Seen::default();
        let mut procs = [SubtableProc::new(0, record), SubtableProc::new(9, record)];
        let n = walk_array(&t, 4, &mut procs, &mut seen, None).unwrap();
        assert_eq!(n.count, 3);
        assert_eq!(procs[0].count, 2);
        assert_eq!(procs[1].count, 1);
        assert_eq!(seen.offsets, [4, 8, 12]);
    }

    #[test]
    fn skipped_entries_do_not_count() {
        let t = table(&[&[0, 3, 1], &[0, 3, 2], &[0, 3, 3]]);
        let mut seen = Seen::default();
        let n = walk(&t, 4, 0, skip_odd, &mut seen, None).unwrap();
        assert_eq!(n.count, 1);
        assert_eq!(seen.offsets, [7]);
    }

    #[test]
    fn zero_length_is_malformed() {
        let t = table(&[&[0, 4, 0, 0], &[5, 0, 0, 0]]);
        let mut seen = Seen::default();
        let err = walk(&t, 4, 0, record, &mut seen, None).unwrap_err();
        assert_eq!(
            err,
            AcpiError::MalformedEntry {
                entry_type: 5,
                offset: 8
            }
        );
        assert_eq!(seen.offsets, [4]);
    }

    #[test]
    fn overlong_entry_stops_before_the_end() {
        // Second entry claims 200 bytes but only 4 remain.
        let t = table(&[&[0, 4, 0, 0], &[0, 200, 0, 0]]);
        let mut seen = Seen::default();
        let err = walk(&t, 4, 0, record, &mut seen, None).unwrap_err();
        assert_eq!(
            err,
            AcpiError::MalformedEntry {
                entry_type: 0,
                offset: 8
            }
        );
        assert_eq!(seen.offsets, [4]);
    }

    #[test]
    fn overlong_unmatched_entry_is_still_malformed() {
        let t = table(&[&[7, 9, 0, 0]]);
        let mut seen = Seen::default();
        assert!(walk(&t, 4, 0, record, &mut seen, None).is_err());
    }

    #[test]
    fn short_entry_rejected_by_handler() {
        let t = table(&[&[0, 3, 0], &[0, 4, 0, 0]]);
        let mut seen = Seen::default();
        let err = walk(&t, 4, 0, record, &mut seen, None).unwrap_err();
        assert_eq!(
            err,
            AcpiError::MalformedEntry {
                entry_type: 0,
                offset: 4
            }
        );
        assert!(seen.offsets.is_empty());
    }

    #[test]
    fn truncation_at_every_length_never_panics() {
        let full = table(&[&[0, 4, 0, 0], &[1, 6, 0, 0, 0, 0], &[0, 8, 0, 0, 0, 0, 0, 0]]);
        for len in 0..=full.len() {
            let mut seen = Seen::default();
            let result = walk(&full[..len], 4, 0, record, &mut seen, None);
            if let Ok(n) = result {
                assert_eq!(n.count, seen.offsets.len());
            }
        }
    }

    #[test]
    fn max_entries_caps_without_error() {
        let t = table(&[&[0, 4, 0, 0], &[0, 4, 0, 0], &[0, 4, 0, 0], &[0, 0]]);
        let mut seen = Seen::default();
        let n = walk(&t, 4, 0, record, &mut seen, Some(2)).unwrap();
        assert_eq!(n.count, 2);
        assert!(n.capped);
        assert_eq!(seen.offsets, [4, 8]);
    }

    #[test]
    fn exactly_max_entries_is_not_capped() {
        let t = table(&[&[0, 4, 0, 0], &[0, 4, 0, 0]]);
        let mut seen = Seen::default();
        let n = walk(&t, 4, 0, record, &mut seen, Some(2)).unwrap();
        assert_eq!(n, WalkSummary { count: 2, capped: false });
    }

    #[test]
    fn unhandled_entries_past_the_ceiling_are_not_capped() {
        let t = table(&[&[0, 4, 0, 0], &[1, 6, 0, 0, 0, 0], &[3, 4, 0, 0]]);
        let mut seen = Seen::default();
        let n = walk(&t, 4, 0, record, &mut seen, Some(1)).unwrap();
        assert_eq!(n, WalkSummary { count: 1, capped: false });
    }

    #[test]
    fn handled_entry_past_the_ceiling_is_capped() {
        let t = table(&[&[0, 4, 0, 0], &[1, 6, 0, 0, 0, 0], &[9, 4, 0, 0]]);
        let mut seen = Seen::default();
        let mut procs = [SubtableProc::new(0, record), SubtableProc::new(9, record)];
        let n = walk_array(&t, 4, &mut procs, &mut seen, Some(1)).unwrap();
        assert_eq!(n, WalkSummary { count: 1, capped: true });
        assert_eq!(procs[1].count, 0);
    }

    #[test]
    fn tallies_survive_a_failed_walk() {
        let t = table(&[&[0, 4, 0, 0], &[9, 4, 0, 0], &[0, 3, 0]]);
        let mut seen = Seen::default();
        let mut procs = [SubtableProc::new(0, record), SubtableProc::new(9, record)];
        assert!(walk_array(&t, 4, &mut procs, &mut seen, None).is_err());
        assert_eq!(procs[0].count, 1);
        assert_eq!(procs[1].count, 1);
    }

    #[test]
    fn trailing_padding_ends_walk_quietly() {
        let mut t = table(&[&[0, 4, 0, 0]]);
        t.push(0);
        let mut seen = Seen::default();
        assert_eq!(walk(&t, 4, 0, record, &mut seen, None).unwrap().count, 1);
    }

    #[test]
    fn empty_run_counts_zero() {
        let t = table(&[]);
        let mut seen = Seen::default();
        assert_eq!(walk(&t, 4, 0, record, &mut seen, None).unwrap().count, 0);
        assert_eq!(walk(&t, 40, 0, record, &mut seen, None).unwrap().count, 0);
    }
}
