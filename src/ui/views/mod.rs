pub mod case_detail;
pub mod history_list;
