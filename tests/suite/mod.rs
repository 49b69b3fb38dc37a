mod combinators;
mod conformance;
