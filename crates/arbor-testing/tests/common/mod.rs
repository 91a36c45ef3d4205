use std::cell::RefCell;

thread_local! {
    static RECORDS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub fn record(entry: impl Into<String>) {
    RECORDS.with(|records| records.borrow_mut().push(entry.into()));
}

pub fn take_records() -> Vec<String> {
    RECORDS.with(|records| records.borrow_mut().drain(..).collect())
}
