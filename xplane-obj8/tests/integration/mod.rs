mod scenarios;
mod serializer;
