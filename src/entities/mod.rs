pub mod mirror_record;
