pub mod supabase;

pub use self::supabase::SupabaseSink;
