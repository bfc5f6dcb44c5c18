pub mod audit;
pub mod config;
pub mod dataset;
pub mod depgraph;
pub mod dialog_templates;
pub mod domain;
pub mod generator;
pub mod integrity;
pub mod interpreter;
pub mod report;
pub mod runtime;
pub mod template;
