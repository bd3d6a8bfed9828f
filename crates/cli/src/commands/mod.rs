pub mod doctor;
pub mod history;
pub mod invoke;
pub mod onboard;
pub mod run;
pub mod serve;
