mod test_connect_timeout;
