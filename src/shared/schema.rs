diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        password_hash -> Text,
        email -> Text,
        first_name -> Text,
        last_name -> Text,
        is_staff -> Bool,
        is_active -> Bool,
        date_joined -> Timestamp,
        last_login -> Nullable<Timestamp>,
    }
}

diesel::table! {
    tickets (id) {
        id -> Integer,
        title -> Text,
        description -> Text,
        severity -> Integer,
        status -> Text,
    }
}

diesel::table! {
    comments (id) {
        id -> Integer,
        ticket_id -> Integer,
        author_id -> Nullable<Integer>,
        text -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    sessions (id) {
        id -> Text,
        user_id -> Integer,
        created_at -> Timestamp,
        last_accessed_at -> Timestamp,
        expires_at -> Timestamp,
        absolute_expires_at -> Timestamp,
        metadata -> Text,
    }
}

diesel::joinable!(comments -> tickets (ticket_id));
diesel::joinable!(comments -> users (author_id));
diesel::joinable!(sessions -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(users, tickets, comments, sessions);
